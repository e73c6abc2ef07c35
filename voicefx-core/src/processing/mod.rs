pub mod parameter_mapper;
pub mod passthrough;
pub mod pcm;
pub mod varispeed;
pub mod wav_format;
