//! imgpress Processing Library
//!
//! Intake validation for uploaded files and the image transcoder that turns every accepted
//! upload into a compressed JPEG.

pub mod transcoder;
pub mod validator;

pub use transcoder::{
    transcode, transcode_file, ChromaSubsampling, Codec, ContainerFormat, JpegTranscoder,
    TranscodeError, TranscodeReport, TranscodeSpec, Transcoder, MAX_SVG_PIXELS, QUALITY,
};
pub use validator::{IntakeValidator, ValidationError};
