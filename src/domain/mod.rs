pub mod segment;
pub mod synth;
pub mod voice;
