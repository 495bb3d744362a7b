pub mod answer;

pub use answer::{AnswerGenerator, AnswerSettings, ChatAnswer, ChatError};
