pub mod health;
pub mod speech;

pub use health::HealthController;
pub use speech::{SpeechController, SpeechRequest};
