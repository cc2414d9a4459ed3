//! Transcript acquisition.
//!
//! Video references go through an ordered strategy chain: native captions first, then audio
//! download + speech-to-text. Caption failures are expected and only move the chain along.
//! Uploaded subtitle files bypass the chain and are parsed directly.

pub mod captions;
pub mod media;
pub mod speech;
pub mod subtitles;

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use tracing::{info, warn};

pub use captions::YtDlpCaptions;
pub use media::{AudioFormat, FfmpegConverter, VideoMetadata, YtDlpMedia};
pub use speech::{OpenAiWhisper, WhisperLocal, silence_whisper_logs};

use crate::{
    error::{Result, TldwError},
    format::{format_timestamp, title_from_file_name, title_from_segments},
    reference::VideoId,
    types::{Provenance, Segment, Transcript},
};

#[async_trait]
pub trait CaptionFetcher: Send + Sync {
    /// Caption cues in order. An empty list means the video has no captions.
    async fn fetch_captions(&self, id: &VideoId) -> Result<Vec<Segment>>;
}

#[async_trait]
pub trait MediaFetcher: Send + Sync {
    async fn metadata(&self, id: &VideoId) -> Result<VideoMetadata>;

    /// Download one audio stream into `dest_dir`, returning the file written.
    async fn download_audio(
        &self,
        id: &VideoId,
        format: &AudioFormat,
        dest_dir: &Path,
    ) -> Result<PathBuf>;
}

#[async_trait]
pub trait AudioConverter: Send + Sync {
    /// Convert to 16 kHz mono PCM WAV.
    async fn to_wav(&self, input: &Path, output: &Path) -> Result<()>;
}

#[async_trait]
pub trait SpeechToText: Send + Sync {
    fn name(&self) -> &str;

    async fn transcribe(&self, wav: &Path) -> Result<Vec<Segment>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscriptStrategy {
    CaptionFetch,
    SpeechTranscription,
}

pub const DEFAULT_CHAIN: [TranscriptStrategy; 2] = [
    TranscriptStrategy::CaptionFetch,
    TranscriptStrategy::SpeechTranscription,
];

/// Codec family preferred when picking an audio-only stream.
pub const PREFERRED_AUDIO_CODEC: &str = "opus";

#[derive(Clone)]
pub struct TranscriptSources {
    captions: Arc<dyn CaptionFetcher>,
    media: Arc<dyn MediaFetcher>,
    converter: Arc<dyn AudioConverter>,
    speech: Option<Arc<dyn SpeechToText>>,
    chain: Vec<TranscriptStrategy>,
    work_dir: PathBuf,
}

impl TranscriptSources {
    pub fn new(
        captions: Arc<dyn CaptionFetcher>,
        media: Arc<dyn MediaFetcher>,
        converter: Arc<dyn AudioConverter>,
        speech: Option<Arc<dyn SpeechToText>>,
        work_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            captions,
            media,
            converter,
            speech,
            chain: DEFAULT_CHAIN.to_vec(),
            work_dir: work_dir.into(),
        }
    }

    pub fn with_chain(mut self, chain: impl Into<Vec<TranscriptStrategy>>) -> Self {
        self.chain = chain.into();
        self
    }

    pub fn chain(&self) -> &[TranscriptStrategy] {
        &self.chain
    }

    /// Walk the strategy chain in declared order; the first success wins.
    pub async fn acquire(&self, id: &VideoId) -> Result<Transcript> {
        let mut last_reason = String::from("no transcript strategy configured");

        for strategy in &self.chain {
            match strategy {
                TranscriptStrategy::CaptionFetch => match self.from_captions(id).await {
                    Ok(transcript) => return Ok(transcript),
                    Err(e) => {
                        info!(video_id = %id, error = %e, "captions unavailable, falling back");
                        last_reason = e.to_string();
                    }
                },
                TranscriptStrategy::SpeechTranscription => return self.from_speech(id).await,
            }
        }

        Err(TldwError::transcript_unavailable(id.as_str(), last_reason))
    }

    async fn from_captions(&self, id: &VideoId) -> Result<Transcript> {
        let segments = self.captions.fetch_captions(id).await?;
        let text = join_segments(&segments);
        if text.is_empty() {
            return Err(TldwError::transcript_unavailable(
                id.as_str(),
                "no captions available",
            ));
        }

        info!(
            video_id = %id,
            segments = segments.len(),
            covers = %format_timestamp(transcript_end(&segments)),
            "using native captions"
        );
        Ok(Transcript {
            text,
            provenance: Provenance::NativeCaptions,
            title: title_from_segments(&segments),
        })
    }

    async fn from_speech(&self, id: &VideoId) -> Result<Transcript> {
        let metadata = self.media.metadata(id).await?;

        let Some(speech) = &self.speech else {
            return Err(TldwError::transcript_unavailable(
                id.as_str(),
                "no captions and no speech-to-text backend is configured \
                 (set TLDW_WHISPER_MODEL or OPENAI_API_KEY)",
            ));
        };

        let format = select_audio_format(&metadata.formats).ok_or_else(|| {
            TldwError::transcript_unavailable(id.as_str(), "no audio-only stream available")
        })?;

        let scratch_unavailable = |e: std::io::Error| {
            TldwError::transcript_unavailable(
                id.as_str(),
                format!("could not create audio scratch dir: {e}"),
            )
        };
        tokio::fs::create_dir_all(&self.work_dir)
            .await
            .map_err(scratch_unavailable)?;
        let scratch = tempfile::Builder::new()
            .prefix("tldw-audio-")
            .tempdir_in(&self.work_dir)
            .map_err(scratch_unavailable)?;

        info!(
            video_id = %id,
            format = %format.format_id,
            codec = format.acodec.as_deref().unwrap_or("unknown"),
            backend = speech.name(),
            "transcribing audio"
        );

        // The scratch directory owns both audio files; it is removed on every path below.
        let outcome: Result<Vec<Segment>> = async {
            let raw = self
                .media
                .download_audio(id, format, scratch.path())
                .await?;
            let wav = scratch.path().join("audio.wav");
            self.converter.to_wav(&raw, &wav).await?;
            speech.transcribe(&wav).await
        }
        .await;

        let scratch_path = scratch.path().to_path_buf();
        if let Err(e) = scratch.close() {
            warn!(path = %scratch_path.display(), error = %e, "failed to remove audio scratch dir");
        }

        let segments = outcome?;
        info!(
            video_id = %id,
            segments = segments.len(),
            covers = %format_timestamp(transcript_end(&segments)),
            "speech transcription finished"
        );
        let text = join_segments(&segments);
        if text.is_empty() {
            return Err(TldwError::transcript_unavailable(
                id.as_str(),
                "speech transcription produced no text",
            ));
        }

        Ok(Transcript {
            text,
            provenance: Provenance::SpeechTranscription,
            title: crate::format::normalize_title(&metadata.title),
        })
    }
}

/// Parse an uploaded SubRip file. Not part of the fallback chain.
pub fn parse_subtitle_file(bytes: &[u8], file_name: &str) -> Result<Transcript> {
    let entries = subtitles::parse_srt(&String::from_utf8_lossy(bytes));
    if entries.is_empty() {
        return Err(TldwError::transcript_unavailable(
            file_name,
            "subtitle file contains no valid entries",
        ));
    }

    Ok(Transcript {
        text: subtitles::join_entries(&entries),
        provenance: Provenance::FileSubtitles,
        title: title_from_file_name(file_name),
    })
}

/// Audio-only streams, preferred codec family first, then by bitrate.
pub fn select_audio_format(formats: &[AudioFormat]) -> Option<&AudioFormat> {
    formats
        .iter()
        .filter(|f| f.is_audio_only())
        .max_by(|a, b| {
            let preferred = |f: &AudioFormat| {
                f.acodec
                    .as_deref()
                    .is_some_and(|codec| codec.starts_with(PREFERRED_AUDIO_CODEC))
            };
            preferred(a)
                .cmp(&preferred(b))
                .then(a.abr.unwrap_or(0.0).total_cmp(&b.abr.unwrap_or(0.0)))
        })
}

fn transcript_end(segments: &[Segment]) -> f64 {
    segments.last().map_or(0.0, |seg| seg.end)
}

fn join_segments(segments: &[Segment]) -> String {
    segments
        .iter()
        .map(|seg| seg.text.trim())
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    };

    use super::*;
    use crate::format::FALLBACK_TITLE;

    pub fn seg(text: &str) -> Segment {
        Segment {
            start: 0.0,
            end: 1.0,
            text: text.to_string(),
        }
    }

    #[derive(Default)]
    pub struct StubCaptions {
        pub segments: Vec<Segment>,
        pub calls: AtomicUsize,
    }

    #[async_trait]
    impl CaptionFetcher for StubCaptions {
        async fn fetch_captions(&self, id: &VideoId) -> Result<Vec<Segment>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.segments.is_empty() {
                return Err(TldwError::transcript_unavailable(id.as_str(), "no subtitles"));
            }
            Ok(self.segments.clone())
        }
    }

    /// Writes a real file so scratch cleanup can be observed.
    #[derive(Default)]
    pub struct StubMedia {
        pub downloaded_to: Mutex<Option<PathBuf>>,
    }

    pub fn formats() -> Vec<AudioFormat> {
        vec![
            AudioFormat::audio("140", "mp4a.40.2", 129.5, "m4a"),
            AudioFormat::audio("251", "opus", 120.0, "webm"),
            AudioFormat::audio("250", "opus", 64.0, "webm"),
        ]
    }

    #[async_trait]
    impl MediaFetcher for StubMedia {
        async fn metadata(&self, _id: &VideoId) -> Result<VideoMetadata> {
            Ok(VideoMetadata {
                title: "A talk about ownership and borrowing".into(),
                author: Some("Ferris".into()),
                duration: Some(600.0),
                formats: formats(),
            })
        }

        async fn download_audio(
            &self,
            _id: &VideoId,
            format: &AudioFormat,
            dest_dir: &Path,
        ) -> Result<PathBuf> {
            let path = dest_dir.join(format!("audio.{}", format.ext));
            tokio::fs::write(&path, b"raw audio").await?;
            *self.downloaded_to.lock().unwrap() = Some(path.clone());
            Ok(path)
        }
    }

    pub struct StubConverter {
        pub fail: bool,
    }

    #[async_trait]
    impl AudioConverter for StubConverter {
        async fn to_wav(&self, _input: &Path, output: &Path) -> Result<()> {
            if self.fail {
                return Err(TldwError::transcript_unavailable("audio", "ffmpeg exited with 1"));
            }
            tokio::fs::write(output, b"RIFF").await?;
            Ok(())
        }
    }

    pub struct StubSpeech {
        pub fail: bool,
    }

    #[async_trait]
    impl SpeechToText for StubSpeech {
        fn name(&self) -> &str {
            "stub"
        }

        async fn transcribe(&self, wav: &Path) -> Result<Vec<Segment>> {
            assert!(wav.exists());
            if self.fail {
                return Err(TldwError::transcript_unavailable("audio", "model crashed"));
            }
            Ok(vec![seg("spoken words"), seg("more words")])
        }
    }

    fn id() -> VideoId {
        VideoId::parse("abcDEF12345").unwrap()
    }

    fn sources(
        captions: Arc<StubCaptions>,
        media: Arc<StubMedia>,
        converter_fails: bool,
        speech: Option<StubSpeech>,
        work_dir: &Path,
    ) -> TranscriptSources {
        TranscriptSources::new(
            captions,
            media,
            Arc::new(StubConverter {
                fail: converter_fails,
            }),
            speech.map(|s| Arc::new(s) as Arc<dyn SpeechToText>),
            work_dir,
        )
    }

    fn scratch_entries(dir: &Path) -> usize {
        std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
    }

    #[tokio::test]
    async fn captions_win_when_available() {
        let dir = tempfile::tempdir().unwrap();
        let captions = Arc::new(StubCaptions {
            segments: vec![
                seg("Today we look at lifetimes in depth."),
                seg("  "),
                seg("They are not scary."),
            ],
            ..Default::default()
        });
        let media = Arc::new(StubMedia::default());
        let sources = sources(captions, media.clone(), false, Some(StubSpeech { fail: false }), dir.path());

        let transcript = sources.acquire(&id()).await.unwrap();

        assert_eq!(transcript.provenance, Provenance::NativeCaptions);
        assert_eq!(
            transcript.text,
            "Today we look at lifetimes in depth. They are not scary."
        );
        assert_eq!(transcript.title, "Today we look at lifetimes in depth");
        assert!(media.downloaded_to.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn caption_acquisition_is_repeatable() {
        let dir = tempfile::tempdir().unwrap();
        let captions = Arc::new(StubCaptions {
            segments: vec![seg("Hi."), seg("short")],
            ..Default::default()
        });
        let sources = sources(captions, Arc::default(), false, None, dir.path());

        let first = sources.acquire(&id()).await.unwrap();
        let second = sources.acquire(&id()).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.title, FALLBACK_TITLE);
    }

    #[tokio::test]
    async fn falls_back_to_speech_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let media = Arc::new(StubMedia::default());
        let sources = sources(
            Arc::default(),
            media.clone(),
            false,
            Some(StubSpeech { fail: false }),
            dir.path(),
        );

        let transcript = sources.acquire(&id()).await.unwrap();

        assert_eq!(transcript.provenance, Provenance::SpeechTranscription);
        assert_eq!(transcript.text, "spoken words more words");
        assert_eq!(transcript.title, "A talk about ownership and borrowing");

        let downloaded = media.downloaded_to.lock().unwrap().clone().unwrap();
        assert!(downloaded.ends_with("audio.webm"));
        assert!(!downloaded.exists());
        assert_eq!(scratch_entries(dir.path()), 0);
    }

    #[tokio::test]
    async fn conversion_failure_still_removes_downloaded_audio() {
        let dir = tempfile::tempdir().unwrap();
        let media = Arc::new(StubMedia::default());
        let sources = sources(
            Arc::default(),
            media.clone(),
            true,
            Some(StubSpeech { fail: false }),
            dir.path(),
        );

        let err = sources.acquire(&id()).await.unwrap_err();

        assert!(matches!(err, TldwError::TranscriptUnavailable { .. }));
        let downloaded = media.downloaded_to.lock().unwrap().clone().unwrap();
        assert!(!downloaded.exists());
        assert_eq!(scratch_entries(dir.path()), 0);
    }

    #[tokio::test]
    async fn transcription_failure_still_removes_scratch() {
        let dir = tempfile::tempdir().unwrap();
        let sources = sources(
            Arc::default(),
            Arc::default(),
            false,
            Some(StubSpeech { fail: true }),
            dir.path(),
        );

        assert!(sources.acquire(&id()).await.is_err());
        assert_eq!(scratch_entries(dir.path()), 0);
    }

    #[tokio::test]
    async fn no_speech_backend_fails_fast_without_downloading() {
        let dir = tempfile::tempdir().unwrap();
        let media = Arc::new(StubMedia::default());
        let sources = sources(Arc::default(), media.clone(), false, None, dir.path());

        let err = sources.acquire(&id()).await.unwrap_err();

        assert!(err.to_string().contains("speech-to-text"));
        assert!(media.downloaded_to.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn unusable_work_dir_is_transcript_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"file").unwrap();
        let sources = sources(
            Arc::default(),
            Arc::default(),
            false,
            Some(StubSpeech { fail: false }),
            &blocker.join("scratch"),
        );

        let err = sources.acquire(&id()).await.unwrap_err();
        assert!(matches!(err, TldwError::TranscriptUnavailable { .. }), "{err:?}");
    }

    #[tokio::test]
    async fn caption_only_chain_reports_caption_reason() {
        let dir = tempfile::tempdir().unwrap();
        let sources = sources(Arc::default(), Arc::default(), false, None, dir.path())
            .with_chain([TranscriptStrategy::CaptionFetch]);

        let err = sources.acquire(&id()).await.unwrap_err();
        assert!(err.to_string().contains("no subtitles"));
    }

    #[test]
    fn prefers_opus_then_bitrate() {
        let formats = formats();
        assert_eq!(select_audio_format(&formats).unwrap().format_id, "251");

        let no_opus: Vec<_> = formats
            .into_iter()
            .filter(|f| f.acodec.as_deref() != Some("opus"))
            .chain([AudioFormat::audio("139", "mp4a.40.5", 48.0, "m4a")])
            .collect();
        assert_eq!(select_audio_format(&no_opus).unwrap().format_id, "140");
    }

    #[test]
    fn video_streams_are_never_selected() {
        let mut muxed = AudioFormat::audio("18", "mp4a.40.2", 96.0, "mp4");
        muxed.vcodec = Some("avc1.42001E".into());
        assert!(select_audio_format(&[muxed]).is_none());
    }

    #[test]
    fn subtitle_file_uses_file_name_title() {
        let srt = "1\n00:00:01,000 --> 00:00:02,000\nHello there\n\n2\n00:00:02,500 --> 00:00:04,000\nGeneral Kenobi\n";
        let transcript = parse_subtitle_file(srt.as_bytes(), "star_wars-episode-iii.srt").unwrap();

        assert_eq!(transcript.provenance, Provenance::FileSubtitles);
        assert_eq!(transcript.text, "Hello there General Kenobi");
        assert_eq!(transcript.title, "star wars episode iii");
    }

    #[test]
    fn subtitle_file_without_entries_is_unavailable() {
        assert!(matches!(
            parse_subtitle_file(b"garbage", "x.srt"),
            Err(TldwError::TranscriptUnavailable { .. })
        ));
    }
}
