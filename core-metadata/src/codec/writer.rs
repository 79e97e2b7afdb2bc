use lofty::config::{ParseOptions, WriteOptions};
use lofty::file::{AudioFile, TaggedFileExt};
use lofty::flac::FlacFile;
use lofty::ogg::OggPictureStorage;
use lofty::picture::{MimeType, Picture, PictureInformation, PictureType};
use lofty::probe::Probe;
use lofty::tag::{Accessor, ItemKey, Tag, TagExt};
use std::fs::{File, OpenOptions};
use std::io::{BufReader, Seek};
use std::path::Path;
use tracing::{debug, warn};

use super::{container_of, map_lofty_error};
use crate::error::{MetadataError, Result};
use crate::model::{
    ContainerFormat, CoverDescriptor, FormatCorrection, SongMetadata, TagField, WriteReport,
};

/// Writes with the writer the extension asks for, then walks the fallback
/// order if the content turns out to be a different container.
pub(super) fn write_with_fallback(
    path: &Path,
    declared: ContainerFormat,
    extension: &str,
    metadata: &SongMetadata,
    cover: Option<&[u8]>,
) -> Result<WriteReport> {
    match write_container(path, declared, metadata, cover) {
        Ok(fields) => return Ok(report(fields, None)),
        Err(MetadataError::ContainerMismatch { expected, actual }) => {
            debug!(%expected, %actual, "Declared container rejected, trying fallbacks");
        }
        Err(e) => return Err(e),
    }

    let mut last_error = None;
    for candidate in ContainerFormat::FALLBACK_ORDER
        .into_iter()
        .filter(|c| *c != declared)
    {
        match write_container(path, candidate, metadata, cover) {
            Ok(fields) => {
                warn!(
                    path = %path.display(),
                    detected = %candidate,
                    extension,
                    "File content does not match its extension"
                );
                let correction = FormatCorrection {
                    detected: candidate,
                    original_extension: extension.to_string(),
                };
                return Ok(report(fields, Some(correction)));
            }
            Err(e) => last_error = Some(e),
        }
    }

    Err(MetadataError::InvalidFormat(format!(
        "{}: no MP4, MP3 or FLAC writer accepted the file ({})",
        path.display(),
        last_error.map(|e| e.to_string()).unwrap_or_default()
    )))
}

fn report(fields: Vec<TagField>, correction: Option<FormatCorrection>) -> WriteReport {
    let cover = fields
        .contains(&TagField::Cover)
        .then(CoverDescriptor::default);
    WriteReport {
        fields_written: fields,
        cover,
        format_correction: correction,
    }
}

/// Writes through one container's tag format. Fails with `ContainerMismatch`
/// without touching the file when the content is something else.
fn write_container(
    path: &Path,
    expected: ContainerFormat,
    metadata: &SongMetadata,
    cover: Option<&[u8]>,
) -> Result<Vec<TagField>> {
    // Content decides the container; the extension is what is being checked.
    let file = File::open(path)?;
    let probe = Probe::new(BufReader::new(file))
        .guess_file_type()
        .map_err(|e| MetadataError::Corrupt(format!("Failed to probe file: {}", e)))?;

    let actual = probe
        .file_type()
        .map(|ft| container_of(&ft))
        .unwrap_or(ContainerFormat::Unknown);
    if actual != expected {
        return Err(MetadataError::ContainerMismatch { expected, actual });
    }

    let mut tagged_file = probe
        .options(ParseOptions::new().read_properties(false))
        .read()
        .map_err(|e| map_lofty_error(path, e))?;

    let tag_type = tagged_file.primary_tag_type();
    if tagged_file.tag(tag_type).is_none() {
        tagged_file.insert_tag(Tag::new(tag_type));
    }
    let tag = tagged_file.tag_mut(tag_type).ok_or_else(|| {
        MetadataError::Corrupt(format!("{}: could not create {:?} tag", path.display(), tag_type))
    })?;

    let fields = apply_fields(tag, metadata, cover);
    if fields.is_empty() {
        return Ok(fields);
    }

    tag.save_to_path(path, WriteOptions::default())
        .map_err(|e| map_lofty_error(path, e))?;

    if let (ContainerFormat::Flac, Some(data)) = (expected, cover) {
        if fields.contains(&TagField::Cover) {
            stamp_flac_cover(path, data, CoverDescriptor::default())?;
        }
    }

    debug!(?tag_type, ?fields, "Tag saved");
    Ok(fields)
}

/// Rewrites the FLAC front cover PICTURE block so it carries `descriptor`
/// instead of the dimensions measured from the JPEG.
fn stamp_flac_cover(path: &Path, cover: &[u8], descriptor: CoverDescriptor) -> Result<()> {
    let mut file = OpenOptions::new().read(true).write(true).open(path)?;
    let mut flac = FlacFile::read_from(&mut file, ParseOptions::new().read_properties(false))
        .map_err(|e| map_lofty_error(path, e))?;

    flac.remove_picture_type(PictureType::CoverFront);
    flac.insert_picture(front_cover(cover), Some(picture_information(descriptor)))
        .map_err(|e| map_lofty_error(path, e))?;

    file.rewind()?;
    flac.save_to(&mut file, WriteOptions::default())
        .map_err(|e| map_lofty_error(path, e))?;
    Ok(())
}

fn picture_information(descriptor: CoverDescriptor) -> PictureInformation {
    PictureInformation {
        width: descriptor.width,
        height: descriptor.height,
        color_depth: descriptor.color_depth,
        num_colors: 0,
    }
}

fn front_cover(data: &[u8]) -> Picture {
    Picture::new_unchecked(
        PictureType::CoverFront,
        Some(MimeType::Jpeg),
        None,
        data.to_vec(),
    )
}

/// Copies present fields into `tag`; absent fields keep their current value.
fn apply_fields(tag: &mut Tag, metadata: &SongMetadata, cover: Option<&[u8]>) -> Vec<TagField> {
    let mut written = Vec::new();

    if let Some(title) = &metadata.title {
        tag.set_title(title.clone());
        written.push(TagField::Title);
    }
    if let Some(artist) = &metadata.artist {
        tag.set_artist(artist.clone());
        written.push(TagField::Artist);
    }
    if let Some(album) = &metadata.album {
        tag.set_album(album.clone());
        written.push(TagField::Album);
    }
    if let Some(album_artist) = &metadata.album_artist {
        tag.insert_text(ItemKey::AlbumArtist, album_artist.clone());
        written.push(TagField::AlbumArtist);
    }
    if let Some(genre) = &metadata.genre {
        tag.set_genre(genre.clone());
        written.push(TagField::Genre);
    }
    if let Some(year) = &metadata.year {
        tag.insert_text(ItemKey::RecordingDate, year.clone());
        written.push(TagField::Year);
    }
    if let Some(track) = metadata.track_number {
        tag.set_track(track.index);
        if let Some(total) = track.total {
            tag.set_track_total(total);
        }
        written.push(TagField::TrackNumber);
    }
    if let Some(lyric) = &metadata.lyric {
        tag.insert_text(ItemKey::Lyrics, lyric.clone());
        written.push(TagField::Lyric);
    }
    if let Some(data) = cover {
        tag.remove_picture_type(PictureType::CoverFront);
        tag.push_picture(front_cover(data));
        written.push(TagField::Cover);
    }

    written
}
