use std::sync::Arc;

use tracing::Instrument;

use imerge_core::frame::{FrameBuffer, PixelFormat};
use imerge_core::{MergeConfig, MergeError, MergeRequest, MergeResult};
use imerge_encode::JpegEncoder;

use crate::image_loader::load_reference;
use crate::resolver::{HttpResolver, ResourceResolver};
use crate::session::{EventSink, MergeEvent, MergeReport, MergeSession, OverlayOutcome};
use crate::settle::SettleBarrier;

/// Merges overlay images onto a background and encodes the result.
///
/// A compositor holds no per-request state; every run builds its own
/// surface and event channel, so one compositor can serve many requests at
/// once.
#[derive(Clone)]
pub struct Compositor {
    config: MergeConfig,
    resolver: Arc<dyn ResourceResolver>,
    encoder: Arc<JpegEncoder>,
}

impl Compositor {
    pub fn new(config: MergeConfig, resolver: Arc<dyn ResourceResolver>) -> MergeResult<Self> {
        config.validate()?;
        let encoder = JpegEncoder::new(config.quality(), config.matte_color()?);
        Ok(Self {
            config,
            resolver,
            encoder: Arc::new(encoder),
        })
    }

    /// A compositor that fetches network references over HTTP(S).
    pub fn with_http(config: MergeConfig) -> MergeResult<Self> {
        let resolver = HttpResolver::new(&config)?;
        Self::new(config, Arc::new(resolver))
    }

    pub fn config(&self) -> &MergeConfig {
        &self.config
    }

    /// Run a request to completion without observing events.
    pub async fn run(&self, request: &MergeRequest) -> MergeResult<MergeReport> {
        self.run_with_events(request, &EventSink::none()).await
    }

    /// Spawn a request on the current runtime. Events arrive on the
    /// session's receiver while the run is in flight.
    pub fn start(&self, request: MergeRequest) -> MergeSession {
        let (sink, events) = EventSink::channel();
        let compositor = self.clone();
        let handle =
            tokio::spawn(async move { compositor.run_with_events(&request, &sink).await });
        MergeSession { events, handle }
    }

    /// Run a request, reporting completion through `events`.
    ///
    /// After every overlay has settled the surface is encoded once. The
    /// overlay that settled last decides whether `Success` or `Error` is
    /// sent; `Finally` always follows. A background that fails to load ends
    /// the run early with `Error` and `Finally` carrying an empty result.
    pub async fn run_with_events(
        &self,
        request: &MergeRequest,
        events: &EventSink,
    ) -> MergeResult<MergeReport> {
        let span = tracing::info_span!(
            "merge",
            request_target = request.target.as_deref().unwrap_or("-"),
            overlays = request.overlays.len()
        );
        self.compose(request, events).instrument(span).await
    }

    async fn compose(&self, request: &MergeRequest, events: &EventSink) -> MergeResult<MergeReport> {
        let mut surface = match self.prepare_surface(request).await {
            Ok(surface) => surface,
            Err(e) => {
                tracing::warn!("Background could not be prepared: {}", e);
                events.emit(MergeEvent::Error {
                    error: e.clone(),
                    result: String::new(),
                });
                events.emit(MergeEvent::Finally {
                    result: String::new(),
                });
                return Err(e);
            }
        };
        let (width, height) = (surface.width, surface.height);

        tracing::info!(
            "Surface {}x{} ready, loading {} overlay(s)",
            width,
            height,
            request.overlays.len()
        );

        let mut barrier = SettleBarrier::new();
        for overlay in &request.overlays {
            barrier.push(load_reference(self.resolver.clone(), overlay.url.clone()));
        }

        let mut outcomes: Vec<Option<OverlayOutcome>> = vec![None; request.overlays.len()];
        let mut last: Option<MergeResult<()>> = None;

        while let Some(settled) = barrier.next().await {
            let is_last = settled.is_last();
            let overlay = &request.overlays[settled.index];
            let outcome = match settled.value {
                Ok(raster) => {
                    let placement = overlay.placement(width, height, self.config.height_basis);
                    surface.draw_image(&raster, placement.bounds(), placement.clip());
                    tracing::debug!(
                        "Drew overlay {} at {:?} ({} pending)",
                        settled.index,
                        placement,
                        settled.remaining
                    );
                    Ok(())
                }
                Err(e) => {
                    tracing::warn!("Overlay {} failed to load: {}", settled.index, e);
                    Err(e)
                }
            };
            outcomes[settled.index] = Some(match &outcome {
                Ok(()) => OverlayOutcome::Drawn,
                Err(e) => OverlayOutcome::Failed(e.to_string()),
            });
            if is_last {
                last = Some(outcome);
            }
        }

        let (data_uri, encode_error) = match self.encoder.encode_data_uri(&surface) {
            Ok(uri) => (uri, None),
            Err(e) => {
                tracing::warn!("Encoding failed, delivering an empty result: {}", e);
                (String::new(), Some(e.to_string()))
            }
        };

        if encode_error.is_none() {
            match last {
                Some(Ok(())) => events.emit(MergeEvent::Success {
                    result: data_uri.clone(),
                }),
                Some(Err(error)) => events.emit(MergeEvent::Error {
                    error,
                    result: data_uri.clone(),
                }),
                None => {}
            }
        }
        events.emit(MergeEvent::Finally {
            result: data_uri.clone(),
        });

        let overlays: Vec<OverlayOutcome> = outcomes
            .into_iter()
            .map(|o| o.unwrap_or_else(|| OverlayOutcome::Failed("never settled".into())))
            .collect();

        tracing::info!(
            "Merge finished: {} drawn, {} failed, {} bytes of output",
            overlays.iter().filter(|o| **o == OverlayOutcome::Drawn).count(),
            overlays.iter().filter(|o| **o != OverlayOutcome::Drawn).count(),
            data_uri.len()
        );

        Ok(MergeReport {
            target: request.target.clone(),
            surface_width: width,
            surface_height: height,
            overlays,
            data_uri,
            encode_error,
            surface,
        })
    }
}

impl Compositor {
    /// Load the background and stretch it over a surface sized from the
    /// config. Any failure here ends the run before overlays are fetched.
    async fn prepare_surface(&self, request: &MergeRequest) -> MergeResult<FrameBuffer> {
        check_request(request)?;
        let background =
            load_reference(self.resolver.clone(), request.background.url.clone()).await?;
        let (width, height) = self
            .config
            .surface_size(background.width, background.height);
        self.config.check_surface_size(width, height)?;

        let mut surface = FrameBuffer::new(width, height, PixelFormat::Rgba8);
        surface.fill_stretched(&background);
        Ok(surface)
    }
}

impl std::fmt::Debug for Compositor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compositor")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Rejects a request before any load starts when it cannot be run at all.
pub fn check_request(request: &MergeRequest) -> MergeResult<()> {
    if request.background.url.trim().is_empty() {
        return Err(MergeError::InvalidArgument(
            "background reference is empty".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::StaticResolver;
    use image::{ImageFormat, Rgba, RgbaImage};
    use imerge_core::{Color, OverlaySpec};
    use std::io::Cursor;

    fn png(width: u32, height: u32, color: [u8; 4]) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        RgbaImage::from_pixel(width, height, Rgba(color))
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    fn compositor(resolver: StaticResolver, display_width: u32) -> Compositor {
        let config = MergeConfig {
            display_width,
            ..Default::default()
        };
        Compositor::new(config, Arc::new(resolver)).unwrap()
    }

    #[tokio::test]
    async fn test_surface_sized_from_background() {
        let resolver = StaticResolver::new().with("bg.png", png(800, 400, [0, 0, 255, 255]));
        let report = compositor(resolver, 400)
            .run(&MergeRequest::new("bg.png"))
            .await
            .unwrap();
        assert_eq!((report.surface_width, report.surface_height), (800, 400));
        assert!(report.data_uri.starts_with("data:image/jpeg;base64,"));
    }

    #[tokio::test]
    async fn test_rect_overlay_lands_at_expected_pixels() {
        let resolver = StaticResolver::new()
            .with("bg.png", png(800, 400, [0, 0, 255, 255]))
            .with("a.png", png(10, 10, [255, 0, 0, 255]));
        let request =
            MergeRequest::new("bg.png").with_overlay(OverlaySpec::rect("a.png", 0.1, 0.1, 0.2, 0.1));
        let report = compositor(resolver, 400).run(&request).await.unwrap();

        let s = &report.surface;
        assert_eq!(s.get_pixel(80, 80), Some(Color::RED.to_rgba8()));
        assert_eq!(s.get_pixel(239, 159), Some(Color::RED.to_rgba8()));
        assert_eq!(s.get_pixel(240, 159), Some(Color::BLUE.to_rgba8()));
        assert_eq!(s.get_pixel(239, 160), Some(Color::BLUE.to_rgba8()));
        assert_eq!(s.get_pixel(79, 80), Some(Color::BLUE.to_rgba8()));
        assert_eq!(report.overlays, vec![OverlayOutcome::Drawn]);
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let config = MergeConfig {
            scale_factor: -1.0,
            ..Default::default()
        };
        assert!(Compositor::new(config, Arc::new(StaticResolver::new())).is_err());
    }

    #[tokio::test]
    async fn test_oversized_overlay_is_clipped_to_surface() {
        let resolver = StaticResolver::new()
            .with("bg.png", png(8, 4, [0, 0, 255, 255]))
            .with("a.png", png(10, 10, [255, 0, 0, 255]));
        let request = MergeRequest::new("bg.png")
            .with_overlay(OverlaySpec::rect("a.png", 0.0, 0.0, 1e7, 1e7));
        let (sink, mut rx) = EventSink::channel();
        let report = compositor(resolver, 50)
            .run_with_events(&request, &sink)
            .await
            .unwrap();
        drop(sink);

        assert_eq!((report.surface_width, report.surface_height), (100, 50));
        assert!(report
            .surface
            .data
            .chunks_exact(4)
            .all(|p| p == Color::RED.to_rgba8()));

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], MergeEvent::Success { .. }));
        assert!(events[1].is_finally());
    }

    #[tokio::test]
    async fn test_surface_too_large_fails_before_allocating() {
        let resolver = StaticResolver::new().with("tall.png", png(1, 100_000, [0, 0, 255, 255]));
        let (sink, mut rx) = EventSink::channel();
        let err = compositor(resolver, 375)
            .run_with_events(&MergeRequest::new("tall.png"), &sink)
            .await
            .unwrap_err();
        drop(sink);
        assert!(matches!(err, MergeError::InvalidArgument(_)));

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], MergeEvent::Error { .. }));
        assert!(events[1].is_finally());
        assert!(events.iter().all(|e| e.result().is_empty()));
    }

    #[test]
    fn test_check_request() {
        assert!(check_request(&MergeRequest::new("bg.png")).is_ok());
        assert!(check_request(&MergeRequest::new("  ")).is_err());
    }
}
