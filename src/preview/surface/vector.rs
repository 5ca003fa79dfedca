use super::{RedrawContext, RenderSurface};
use crate::preview::error::PreviewError;
use crate::preview::host::HostElement;
use crate::preview::options::PreviewOptions;
use crate::preview::session::{RenderSession, VectorParams};
use crate::preview::types::RenderMode;

/// Injects session-produced vector markup into the host element
#[derive(Debug)]
pub struct VectorSurface {
    source_mapping: bool,
    is_content_preview: bool,
}

impl VectorSurface {
    #[must_use]
    pub fn new(options: &PreviewOptions) -> Self {
        Self {
            source_mapping: options.source_mapping,
            is_content_preview: options.is_content_preview,
        }
    }
}

impl RenderSurface for VectorSurface {
    fn mode(&self) -> RenderMode {
        RenderMode::Vector
    }

    fn resize_to_fit(&mut self, host: &mut dyn HostElement, ctx: &RedrawContext) {
        host.set_transform(ctx.scale.effective());
    }

    fn redraw(
        &mut self,
        session: &dyn RenderSession,
        host: &mut dyn HostElement,
        ctx: &RedrawContext,
    ) -> Result<(), PreviewError> {
        let markup = session.render_vector(&VectorParams {
            page_color: ctx.page_color,
            partial_page: ctx.partial_page,
            source_mapping: self.source_mapping,
            is_content_preview: self.is_content_preview,
        })?;
        host.replace_markup(markup);
        Ok(())
    }

    fn poll(&mut self) -> Result<bool, PreviewError> {
        Ok(false)
    }

    fn after_redraw(&mut self, host: &mut dyn HostElement, ctx: &RedrawContext) {
        // Replacing the markup dropped the previous hooks
        if self.source_mapping {
            host.install_source_hooks();
        }
        host.show_cursor(ctx.cursor);
    }

    fn abort(&mut self) {}

    fn release(&mut self) {}
}
