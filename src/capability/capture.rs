//! Camera and screen capture
//!
//! [`MediaDevice`] is the platform seam: it hands out a live stream, toggles
//! its tracks and produces encoded bytes. [`Recorder`] keeps the observable
//! [`CaptureState`] and files finished photos and recordings into the `files`
//! collection.

use serde::Serialize;
use crate::collection::Collection;
use crate::models::{MediaFile, MediaType};
use crate::record::now_millis;
use super::{CapabilityError, CapabilityResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    Camera,
    Screen,
}

impl DeviceKind {
    /// Prefix of every file name this device produces
    pub fn prefix(&self) -> &'static str {
        match self {
            DeviceKind::Camera => "camera",
            DeviceKind::Screen => "screen",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Track {
    Audio,
    Video,
}

pub trait MediaDevice: Send {
    fn kind(&self) -> DeviceKind;

    /// Acquire the stream, asking for permission if needed
    fn start(&mut self) -> CapabilityResult<()>;

    fn stop(&mut self) -> CapabilityResult<()>;

    fn set_track_enabled(&mut self, track: Track, enabled: bool) -> CapabilityResult<()>;

    fn start_recording(&mut self) -> CapabilityResult<()>;

    /// Finish the recording and return the encoded video
    fn stop_recording(&mut self) -> CapabilityResult<Vec<u8>>;

    /// Grab the current frame as a JPEG
    fn snapshot(&mut self) -> CapabilityResult<Vec<u8>>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureState {
    pub active: bool,
    pub audio_enabled: bool,
    pub video_enabled: bool,
    pub recording: bool,
    pub granted: bool,
    pub error: Option<String>,
}

impl Default for CaptureState {
    fn default() -> Self {
        Self {
            active: false,
            audio_enabled: true,
            video_enabled: true,
            recording: false,
            granted: false,
            error: None,
        }
    }
}

pub struct Recorder<D: MediaDevice> {
    device: D,
    files: Collection<MediaFile>,
    state: CaptureState,
}

impl<D: MediaDevice> Recorder<D> {
    pub fn new(device: D, files: Collection<MediaFile>) -> Self {
        Self {
            device,
            files,
            state: CaptureState::default(),
        }
    }

    pub fn state(&self) -> &CaptureState {
        &self.state
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    /// Start the stream. Failures are recorded in the state and returned.
    pub fn start_capture(&mut self) -> CapabilityResult<()> {
        match self.device.start() {
            Ok(()) => {
                self.state.active = true;
                self.state.audio_enabled = true;
                self.state.video_enabled = true;
                self.state.granted = true;
                self.state.error = None;
                tracing::debug!("{} capture started", self.device.kind().prefix());
                Ok(())
            }
            Err(err) => {
                tracing::warn!("{} capture failed: {}", self.device.kind().prefix(), err);
                self.state.granted = false;
                self.state.error = Some(err.to_string());
                Err(err)
            }
        }
    }

    /// Stop the stream; a no-op when nothing is running
    pub fn stop_capture(&mut self) -> CapabilityResult<()> {
        if !self.state.active {
            return Ok(());
        }
        self.device.stop()?;
        self.state.active = false;
        self.state.recording = false;
        self.state.audio_enabled = true;
        self.state.video_enabled = true;
        Ok(())
    }

    pub fn toggle_audio(&mut self) -> CapabilityResult<()> {
        self.toggle(Track::Audio)
    }

    pub fn toggle_video(&mut self) -> CapabilityResult<()> {
        self.toggle(Track::Video)
    }

    fn toggle(&mut self, track: Track) -> CapabilityResult<()> {
        if !self.state.active {
            return Ok(());
        }
        let enabled = match track {
            Track::Audio => !self.state.audio_enabled,
            Track::Video => !self.state.video_enabled,
        };
        self.device.set_track_enabled(track, enabled)?;
        match track {
            Track::Audio => self.state.audio_enabled = enabled,
            Track::Video => self.state.video_enabled = enabled,
        }
        Ok(())
    }

    pub fn start_recording(&mut self) -> CapabilityResult<()> {
        if !self.state.active {
            return Err(CapabilityError::Unavailable("no active stream".to_string()));
        }
        if self.state.recording {
            return Ok(());
        }
        self.device.start_recording()?;
        self.state.recording = true;
        Ok(())
    }

    /// Finish the recording and save it as `{prefix}_{ts}.mp4`.
    /// Returns `None` when nothing was recording.
    pub async fn stop_recording(&mut self) -> CapabilityResult<Option<MediaFile>> {
        if !self.state.recording {
            return Ok(None);
        }
        let data = self.device.stop_recording();
        self.state.recording = false;

        let file_name = format!("{}_{}.mp4", self.device.kind().prefix(), now_millis());
        self.store(file_name, MediaType::Mp4, data?).await.map(Some)
    }

    /// Save the current frame as `{prefix}_photo_{ts}.jpeg`.
    /// Returns `None` when the stream is not active.
    pub async fn take_picture(&mut self) -> CapabilityResult<Option<MediaFile>> {
        if !self.state.active {
            return Ok(None);
        }
        let data = self.device.snapshot()?;
        let file_name = format!("{}_photo_{}.jpeg", self.device.kind().prefix(), now_millis());
        self.store(file_name, MediaType::Jpeg, data).await.map(Some)
    }

    async fn store(
        &self,
        file_name: String,
        file_type: MediaType,
        data: Vec<u8>,
    ) -> CapabilityResult<MediaFile> {
        let file = MediaFile::new(file_name, file_type, data);
        self.files.save(&file).await?;
        tracing::info!("saved {} ({} bytes)", file.file_name, file.size());
        Ok(file)
    }
}
