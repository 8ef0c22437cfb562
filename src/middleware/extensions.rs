use crate::core::variety::Variety;
use actix_web::HttpResponse;

/// Route-level CSP settings.
///
/// Register it as resource or scope data to force the headers onto every
/// response of that route, whatever its variety:
///
/// ```ignore
/// web::resource("/embed")
///     .app_data(RouteCsp::forced())
///     .route(web::get().to(embed));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouteCsp {
    force: bool,
}

impl RouteCsp {
    #[inline]
    pub const fn forced() -> Self {
        Self { force: true }
    }

    #[inline]
    pub const fn new(force: bool) -> Self {
        Self { force }
    }

    #[inline]
    pub fn forces(&self) -> bool {
        self.force
    }
}

/// Per-response tagging for handlers.
pub trait CspExtensions {
    /// Overrides the content-type based variety of this response.
    fn with_variety(self, variety: Variety) -> Self;

    /// Attaches the headers regardless of variety.
    fn force_csp(self) -> Self;
}

impl<B> CspExtensions for HttpResponse<B> {
    fn with_variety(mut self, variety: Variety) -> Self {
        self.extensions_mut().insert(variety);
        self
    }

    fn force_csp(mut self) -> Self {
        self.extensions_mut().insert(RouteCsp::forced());
        self
    }
}
