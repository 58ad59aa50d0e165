pub mod options;
pub mod render;

pub use options::{
    DocumentMeta, Heading, InvalidTocRange, MAX_HEADING_DEPTH, Margins, PageSize, RenderOptions,
    TocRange,
};
pub use render::{Artifact, RenderError, RenderOutput, RenderRequest, Renderer, RendererFactory};
