pub mod sqlnote;
