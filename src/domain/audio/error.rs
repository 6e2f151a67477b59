#[derive(Debug, thiserror::Error)]
pub enum AssemblyError {
    #[error("no narration units to assemble")]
    Empty,
    #[error("no narration unit was synthesized successfully")]
    NoDecodedUnits,
    #[error("render error: {0}")]
    Render(String),
    #[error("encode error: {0}")]
    Encode(String),
}
