use thiserror::Error;

/// Errors surfaced by the viewer core.
///
/// `UnknownModel`, `DuplicateName`, and `InvalidAsset` are returned
/// synchronously to the issuing panel and never reach the rendering layer.
/// `LoadFailure` is absorbed by the session's fallback transition and only
/// crosses this boundary inside a load completion.
#[derive(Error, Debug)]
pub enum ViewerError {
    /// Selection or removal of a name that is not registered.
    #[error("unknown model \"{0}\"")]
    UnknownModel(String),

    /// Administrative add with a name that is already registered.
    #[error("a model named \"{0}\" already exists")]
    DuplicateName(String),

    /// Administrative add with a file that fails format validation.
    #[error("invalid asset \"{0}\": only .glb and .gltf files are supported")]
    InvalidAsset(String),

    /// The asset loader reported an error or produced an unusable result.
    #[error("failed to load model: {0}")]
    LoadFailure(String),
}
