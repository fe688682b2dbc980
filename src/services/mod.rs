pub mod generative;
