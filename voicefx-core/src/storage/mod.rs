pub mod metadata;
pub mod wave_writer;
