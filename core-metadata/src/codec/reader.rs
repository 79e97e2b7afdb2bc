use lofty::config::ParseOptions;
use lofty::file::{AudioFile, TaggedFileExt};
use lofty::picture::PictureType;
use lofty::probe::Probe;
use lofty::tag::{Accessor, ItemKey, Tag};
use std::io::Cursor;
use std::path::Path;
use tracing::debug;

use super::{container_of, map_lofty_error};
use crate::error::{MetadataError, Result};
use crate::model::{non_empty, ContainerFormat, SongMetadata, TrackNumber};

/// Parses tags out of an in-memory copy of the file.
pub(super) fn parse(
    path: &Path,
    data: &[u8],
    options: ParseOptions,
) -> Result<(SongMetadata, ContainerFormat)> {
    let tagged_file = Probe::new(Cursor::new(data))
        .options(options)
        .guess_file_type()
        .map_err(|e| MetadataError::Corrupt(format!("Failed to probe file: {}", e)))?
        .read()
        .map_err(|e| map_lofty_error(path, e))?;

    let container = container_of(&tagged_file.file_type());
    if container == ContainerFormat::Unknown {
        return Err(MetadataError::UnsupportedFormat(format!(
            "{}: {:?} is not an MP3, FLAC or MP4 container",
            path.display(),
            tagged_file.file_type()
        )));
    }

    let tag = tagged_file
        .primary_tag()
        .or_else(|| tagged_file.first_tag());

    let mut metadata = tag.map(metadata_from_tag).unwrap_or_default();

    let secs = tagged_file.properties().duration().as_secs();
    metadata.duration = u32::try_from(secs).ok().filter(|s| *s > 0);

    if metadata.artist.is_none() && metadata.title.is_none() {
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
        if let Some((artist, title)) = split_artist_title(stem) {
            debug!(artist = %artist, title = %title, "Filled artist/title from file name");
            metadata.artist = Some(artist);
            metadata.title = Some(title);
        }
    }

    Ok((metadata, container))
}

fn metadata_from_tag(tag: &Tag) -> SongMetadata {
    let year = tag
        .get_string(&ItemKey::RecordingDate)
        .or_else(|| tag.get_string(&ItemKey::Year))
        .and_then(non_empty);

    let track_number = tag
        .track()
        .filter(|index| *index > 0)
        .map(|index| TrackNumber::new(index, tag.track_total().filter(|t| *t > 0)));

    let cover_art = tag
        .pictures()
        .iter()
        .find(|pic| pic.pic_type() == PictureType::CoverFront)
        .or_else(|| tag.pictures().first())
        .map(|pic| pic.data().to_vec())
        .filter(|data| !data.is_empty());

    SongMetadata {
        title: tag.title().and_then(non_empty),
        artist: tag.artist().and_then(non_empty),
        album: tag.album().and_then(non_empty),
        album_artist: tag.get_string(&ItemKey::AlbumArtist).and_then(non_empty),
        genre: tag.genre().and_then(non_empty),
        year,
        track_number,
        duration: None,
        cover_art,
        lyric: tag
            .get_string(&ItemKey::Lyrics)
            .filter(|l| !l.trim().is_empty())
            .map(str::to_string),
    }
}

/// Splits `"Artist - Title"` when the stem has exactly one `" - "` separator.
pub fn split_artist_title(stem: &str) -> Option<(String, String)> {
    let parts: Vec<&str> = stem.split(" - ").collect();
    if parts.len() != 2 {
        return None;
    }

    let artist = non_empty(parts[0])?;
    let title = non_empty(parts[1])?;
    Some((artist, title))
}
