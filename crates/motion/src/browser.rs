//! Headless Chromium host for the preview page.
//!
//! With the `browser` feature the preview is loaded into Chromium over the
//! Chrome `DevTools` Protocol, and [`PreviewPage`] implements both
//! [`RenderSurface`](crate::surface::RenderSurface) and
//! [`AnimationDriver`](crate::animation::AnimationDriver) on top of it.

use std::path::PathBuf;

/// Browser launch settings
#[derive(Debug, Clone)]
pub struct BrowserConfig {
    /// Run without a window
    pub headless: bool,
    /// Window width
    pub viewport_width: u32,
    /// Window height
    pub viewport_height: u32,
    /// Chromium binary (None = auto-detect)
    pub chromium_path: Option<PathBuf>,
    /// Chromium sandbox (disable in containers)
    pub sandbox: bool,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            viewport_width: 1280,
            viewport_height: 800,
            chromium_path: None,
            sandbox: true,
        }
    }
}

impl BrowserConfig {
    /// Set window dimensions
    #[must_use]
    pub const fn with_viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport_width = width;
        self.viewport_height = height;
        self
    }

    /// Set headless mode
    #[must_use]
    pub const fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Set chromium path
    #[must_use]
    pub fn with_chromium_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.chromium_path = Some(path.into());
        self
    }

    /// Disable sandbox (for containers/CI)
    #[must_use]
    pub const fn with_no_sandbox(mut self) -> Self {
        self.sandbox = false;
        self
    }
}

#[cfg(feature = "browser")]
#[allow(clippy::missing_errors_doc, clippy::cast_possible_truncation)]
mod cdp {
    use super::BrowserConfig;
    use crate::animation::AnimationDriver;
    use crate::frame::BitmapFrame;
    use crate::preview::{PreviewDocument, PREVIEW_ELEMENT_ID};
    use crate::profile::CaptureQuality;
    use crate::result::{MotionError, MotionResult};
    use crate::surface::{normalize_to, ElementRect, RenderSurface};
    use async_trait::async_trait;
    use base64::Engine;
    use chromiumoxide::browser::{Browser as CdpBrowser, BrowserConfig as CdpConfig};
    use chromiumoxide::cdp::browser_protocol::page::{
        CaptureScreenshotFormat, CaptureScreenshotParams, Viewport,
    };
    use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
    use chromiumoxide::js::EvaluationResult;
    use chromiumoxide::page::Page as CdpPage;
    use futures::StreamExt;
    use std::time::Duration;
    use tracing::{debug, info};

    /// Running Chromium instance
    #[derive(Debug)]
    pub struct PreviewBrowser {
        config: BrowserConfig,
        inner: CdpBrowser,
        handle: tokio::task::JoinHandle<()>,
    }

    impl PreviewBrowser {
        /// Launch Chromium
        pub async fn launch(config: BrowserConfig) -> MotionResult<Self> {
            let mut builder = CdpConfig::builder()
                .window_size(config.viewport_width, config.viewport_height);
            if !config.headless {
                builder = builder.with_head();
            }
            if !config.sandbox {
                builder = builder.no_sandbox();
            }
            if let Some(ref path) = config.chromium_path {
                builder = builder.chrome_executable(path);
            }
            let cdp_config = builder
                .build()
                .map_err(|message| MotionError::Browser { message })?;

            let (inner, mut handler) =
                CdpBrowser::launch(cdp_config)
                    .await
                    .map_err(|e| MotionError::Browser {
                        message: e.to_string(),
                    })?;
            // The connection only makes progress while the handler is polled
            let handle = tokio::spawn(async move {
                while let Some(event) = handler.next().await {
                    if event.is_err() {
                        break;
                    }
                }
            });
            info!(headless = config.headless, "chromium launched");

            Ok(Self {
                config,
                inner,
                handle,
            })
        }

        /// The launch settings
        #[must_use]
        pub const fn config(&self) -> &BrowserConfig {
            &self.config
        }

        /// Open a tab showing `document` and wait for its script
        pub async fn open(&self, document: &PreviewDocument) -> MotionResult<PreviewPage> {
            let html = document.render()?;
            let page = self
                .inner
                .new_page("about:blank")
                .await
                .map_err(page_error)?;
            page.set_content(html).await.map_err(page_error)?;

            let preview = PreviewPage { page };
            preview
                .evaluate("typeof window.snippetMotion === 'object'")
                .await?
                .into_value::<bool>()
                .map_err(page_error)?
                .then_some(())
                .ok_or_else(|| MotionError::Page {
                    message: "preview script did not initialize".to_string(),
                })?;
            debug!(chars = document.code().chars().count(), "preview page ready");
            Ok(preview)
        }

        /// Close the browser
        pub async fn close(mut self) -> MotionResult<()> {
            let result = self.inner.close().await;
            self.handle.abort();
            result.map(|_| ()).map_err(|e| MotionError::Browser {
                message: e.to_string(),
            })
        }
    }

    /// Preview tab: the capture surface and the animation driver at once.
    ///
    /// `Page` is a cheap handle and CDP calls may overlap, so the sampler can
    /// rasterize while `start` is still awaiting the animation.
    #[derive(Debug, Clone)]
    pub struct PreviewPage {
        page: CdpPage,
    }

    impl PreviewPage {
        async fn evaluate(&self, expression: &str) -> MotionResult<EvaluationResult> {
            let params = EvaluateParams::builder()
                .expression(expression)
                .await_promise(true)
                .return_by_value(true)
                .build()
                .map_err(|message| MotionError::Page { message })?;
            self.page
                .evaluate_expression(params)
                .await
                .map_err(page_error)
        }

        /// Layout box of the capture target after a forced reflow
        pub async fn element_rect(&self) -> MotionResult<ElementRect> {
            let js = format!(
                "(() => {{ \
                   const el = document.getElementById('{PREVIEW_ELEMENT_ID}'); \
                   if (!el || !el.isConnected) return null; \
                   void el.offsetHeight; \
                   const r = el.getBoundingClientRect(); \
                   return {{ x: r.left + window.scrollX, y: r.top + window.scrollY, \
                             width: r.width, height: r.height }}; \
                 }})()"
            );
            let rect = self
                .evaluate(&js)
                .await
                .map_err(|e| MotionError::capture(e.to_string()))?
                .into_value::<Option<ElementRect>>()
                .map_err(|e| MotionError::capture(e.to_string()))?
                .ok_or_else(|| MotionError::capture("preview element is not attached"))?;
            if !rect.has_area() {
                return Err(MotionError::capture("preview element has no layout size"));
            }
            Ok(rect)
        }

        async fn screenshot(&self, rect: &ElementRect, scale: f64) -> MotionResult<Vec<u8>> {
            let params = CaptureScreenshotParams::builder()
                .format(CaptureScreenshotFormat::Png)
                .clip(Viewport {
                    x: rect.x,
                    y: rect.y,
                    width: rect.width,
                    height: rect.height,
                    scale,
                })
                .capture_beyond_viewport(true)
                .build();
            let screenshot = self
                .page
                .execute(params)
                .await
                .map_err(|e| MotionError::capture(e.to_string()))?;
            base64::engine::general_purpose::STANDARD
                .decode(&screenshot.data)
                .map_err(|e| MotionError::capture(e.to_string()))
        }
    }

    #[async_trait]
    impl RenderSurface for PreviewPage {
        async fn next_paint(&self) -> MotionResult<()> {
            self.evaluate("new Promise(resolve => requestAnimationFrame(() => resolve(true)))")
                .await
                .map(|_| ())
        }

        async fn rasterize(&self, quality: &CaptureQuality) -> MotionResult<BitmapFrame> {
            let rect = self.element_rect().await?;
            let (width, height) = rect.capture_dimensions(quality.scale)?;
            let png = self.screenshot(&rect, quality.scale).await?;
            let decoded = BitmapFrame::from_png(&png, Duration::ZERO)?;
            Ok(BitmapFrame::new(
                normalize_to(decoded.into_image(), width, height),
                Duration::ZERO,
            ))
        }
    }

    #[async_trait]
    impl AnimationDriver for PreviewPage {
        async fn start(&self) -> MotionResult<()> {
            self.evaluate("window.snippetMotion.start().then(() => true)")
                .await
                .map(|_| ())
                .map_err(|e| MotionError::AnimationFailed {
                    message: e.to_string(),
                })
        }

        async fn reset(&self) -> MotionResult<()> {
            self.evaluate("(window.snippetMotion.reset(), true)")
                .await
                .map(|_| ())
        }
    }

    fn page_error(e: impl std::fmt::Display) -> MotionError {
        MotionError::Page {
            message: e.to_string(),
        }
    }
}

#[cfg(feature = "browser")]
pub use cdp::{PreviewBrowser, PreviewPage};
