pub mod cjk;
pub mod filter;
pub mod filters {
    pub mod lowercase;
    pub mod stemmer;
}
pub mod token;
pub mod tokenizer;

pub use filter::TokenFilter;
pub use token::Token;
pub use tokenizer::{StandardTokenizer, Tokenizer};
