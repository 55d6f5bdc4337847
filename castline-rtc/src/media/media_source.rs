use anyhow::{Result, bail};
use async_trait::async_trait;
use bytes::Bytes;
use castline_core::StreamId;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::info;
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MIME_TYPE_VP8};
use webrtc::media::Sample;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

/// The capture handle a broadcaster fans out.
///
/// Tracks are shared read-only by every link; `stop` is called once, after
/// the last link is gone.
#[async_trait]
pub trait MediaSource: Send + Sync {
    fn tracks(&self) -> Vec<Arc<dyn TrackLocal + Send + Sync>>;

    async fn stop(&self);
}

/// A VP8 video track and an Opus audio track fed by the host with
/// pre-encoded samples.
pub struct StaticMediaSource {
    video: Arc<TrackLocalStaticSample>,
    audio: Arc<TrackLocalStaticSample>,
    stopped: AtomicBool,
}

impl StaticMediaSource {
    pub fn new(stream_id: &StreamId) -> Self {
        let video = Arc::new(TrackLocalStaticSample::new(
            RTCRtpCodecCapability {
                mime_type: MIME_TYPE_VP8.to_owned(),
                ..Default::default()
            },
            "video".to_owned(),
            stream_id.to_string(),
        ));
        let audio = Arc::new(TrackLocalStaticSample::new(
            RTCRtpCodecCapability {
                mime_type: MIME_TYPE_OPUS.to_owned(),
                ..Default::default()
            },
            "audio".to_owned(),
            stream_id.to_string(),
        ));

        Self {
            video,
            audio,
            stopped: AtomicBool::new(false),
        }
    }

    pub async fn write_video(&self, data: Bytes, duration: Duration) -> Result<()> {
        self.write_sample(&self.video, data, duration).await
    }

    pub async fn write_audio(&self, data: Bytes, duration: Duration) -> Result<()> {
        self.write_sample(&self.audio, data, duration).await
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    async fn write_sample(
        &self,
        track: &TrackLocalStaticSample,
        data: Bytes,
        duration: Duration,
    ) -> Result<()> {
        if self.is_stopped() {
            bail!("media source is stopped");
        }
        track
            .write_sample(&Sample {
                data,
                duration,
                ..Default::default()
            })
            .await?;
        Ok(())
    }
}

#[async_trait]
impl MediaSource for StaticMediaSource {
    fn tracks(&self) -> Vec<Arc<dyn TrackLocal + Send + Sync>> {
        vec![self.video.clone(), self.audio.clone()]
    }

    async fn stop(&self) {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            info!("Media source stopped");
        }
    }
}
