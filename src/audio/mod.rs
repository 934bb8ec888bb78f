pub mod decode;
pub mod source;
pub mod spectrogram;

use thiserror::Error;

use decode::PcmBuffer;
use source::SourceLocator;
use spectrogram::SpectrogramMatrix;

/// Failure modes of a load request. All of them are recoverable at the
/// session boundary: the previously published clip, if any, stays intact.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to fetch audio source: {0}")]
    Fetch(anyhow::Error),
    #[error("failed to decode audio: {0}")]
    Decode(anyhow::Error),
    #[error("decoded audio contains no samples")]
    EmptyInput,
}

/// Fetch, decode and analyze one clip. This is the body of a background
/// load task; the session decides whether the result is still current.
pub fn load_clip(locator: &SourceLocator) -> Result<(PcmBuffer, SpectrogramMatrix), LoadError> {
    let bytes = source::fetch_audio(locator)?;
    let pcm = decode::decode_audio(&bytes, locator.extension_hint().as_deref())?;
    let matrix = spectrogram::analyze(&pcm);
    Ok((pcm, matrix))
}
