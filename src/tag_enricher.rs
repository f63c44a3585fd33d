//! `TagEnricher` (spec.md §4.4): on MP3 upload, derives artist/title/album/
//! genre/year/track/duration from the staged file and builds the track
//! metadata record `DeviceSession::upload_track` wants instead of a bare
//! file upload.
//!
//! ID3 frame parsing and MPEG duration estimation are external collaborators
//! (spec.md §1), provided here by the `id3` and `mp3-duration` crates. This
//! module is only the orchestration spec.md §4.4 describes: frame
//! precedence, the `<Unknown>` fallback, and wiring the result into
//! `TrackMetadata`.

use std::fs::File;
use std::io::{Seek, SeekFrom};

use id3::TagLike;

use crate::device::{TrackMetadata, UNKNOWN_TAG};

pub struct TagEnricher;

impl TagEnricher {
    /// `true` iff `filename`'s extension is `.mp3`, case-insensitive —
    /// the only gate spec.md §4.4 puts on running the enricher at all.
    pub fn applies_to(filename: &str) -> bool {
        filename.rsplit('.').next().map(|ext| ext.eq_ignore_ascii_case("mp3")).unwrap_or(false)
    }

    /// Builds a `TrackMetadata` from an already-staged MP3 file.
    ///
    /// Per spec.md §7's tag-extraction error policy, a missing or
    /// unparseable tag never aborts the upload: every field simply falls
    /// back to `<Unknown>` (or `0` duration, scanner permitting).
    pub fn enrich(staged: &mut File, file_size: u64) -> TrackMetadata {
        let _ = staged.seek(SeekFrom::Start(0));
        let tag = id3::Tag::read_from(&mut *staged).ok();

        let artist = tag
            .as_ref()
            .and_then(|t| first_non_empty(&[t.artist(), t.get("TPE2").and_then(|f| f.content().text()), t.get("TPE3").and_then(|f| f.content().text()), t.get("TPE4").and_then(|f| f.content().text()), t.get("TCOM").and_then(|f| f.content().text())]))
            .unwrap_or(UNKNOWN_TAG)
            .to_string();

        let title = tag.as_ref().and_then(|t| t.title()).unwrap_or(UNKNOWN_TAG).to_string();
        let album = tag.as_ref().and_then(|t| t.album()).unwrap_or(UNKNOWN_TAG).to_string();
        let genre = tag.as_ref().and_then(|t| t.genre()).unwrap_or(UNKNOWN_TAG).to_string();

        let year = tag
            .as_ref()
            .and_then(|t| t.get("TYER").and_then(|f| f.content().text()).or_else(|| t.get("TDRC").and_then(|f| f.content().text())))
            .unwrap_or(UNKNOWN_TAG)
            .to_string();

        let track_number = tag
            .as_ref()
            .and_then(|t| t.get("TRCK").and_then(|f| f.content().text()))
            .map(|raw| raw.split('/').next().unwrap_or(raw).to_string())
            .unwrap_or_else(|| UNKNOWN_TAG.to_string());

        let duration_ms = Self::duration_ms(&tag, staged, file_size);

        TrackMetadata { artist, title, album, genre, year, track_number, duration_ms }
    }

    /// spec.md §4.4.2: TLEN frame (already milliseconds) wins if present and
    /// positive; otherwise defer to `mp3-duration`'s frame-header scan
    /// (Xing VBR frame count, CBR `filesize*8/bitrate`, or per-frame
    /// summation as a last resort — exactly the fallback chain spec.md
    /// describes, implemented by that crate).
    fn duration_ms(tag: &Option<id3::Tag>, staged: &mut File, _file_size: u64) -> u64 {
        if let Some(tlen) = tag.as_ref().and_then(|t| t.get("TLEN")).and_then(|f| f.content().text()).and_then(|s| s.parse::<u64>().ok()) {
            if tlen > 0 {
                return tlen;
            }
        }

        let _ = staged.seek(SeekFrom::Start(0));
        mp3_duration::from_read(staged).map(|d| d.as_millis() as u64).unwrap_or(0)
    }
}

fn first_non_empty<'a>(candidates: &[Option<&'a str>]) -> Option<&'a str> {
    candidates.iter().flatten().find(|s| !s.is_empty()).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn applies_to_is_case_insensitive_on_extension() {
        assert!(TagEnricher::applies_to("song.mp3"));
        assert!(TagEnricher::applies_to("song.MP3"));
        assert!(!TagEnricher::applies_to("song.wav"));
        assert!(!TagEnricher::applies_to("mp3"));
    }

    #[test]
    fn tagless_file_falls_back_to_unknown_and_zero_duration() {
        let mut tmp = tempfile::tempfile().unwrap();
        use std::io::Write;
        tmp.write_all(b"not actually an mp3").unwrap();

        let metadata = TagEnricher::enrich(&mut tmp, 19);
        assert_eq!(metadata.artist, UNKNOWN_TAG);
        assert_eq!(metadata.title, UNKNOWN_TAG);
        assert_eq!(metadata.duration_ms, 0);
    }
}
