//! Extension → MTP filetype mapping (spec.md §6). Used by `release` to pick
//! an object type when uploading a file that doesn't go through
//! `TagEnricher`.

/// Maps a lowercase, leading-dot-stripped extension to the MTP filetype tag
/// spec.md §6 lists. Unknown extensions map to `"UNKNOWN"`.
pub fn from_extension(extension: &str) -> &'static str {
    match extension.to_ascii_lowercase().as_str() {
        "wav" => "WAV",
        "mp3" => "MP3",
        "wma" => "WMA",
        "ogg" => "OGG",
        "aa" => "AUDIBLE",
        "mp4" => "MP4",
        "wmv" => "WMV",
        "avi" => "AVI",
        "mpeg" | "mpg" => "MPEG",
        "asf" => "ASF",
        "qt" | "mov" => "QT",
        "jpg" | "jpeg" => "JPEG",
        "jfif" => "JFIF",
        "tif" | "tiff" => "TIFF",
        "bmp" => "BMP",
        "gif" => "GIF",
        "pic" | "pict" => "PICT",
        "png" => "PNG",
        "wmf" => "WINDOWSIMAGEFORMAT",
        "ics" => "VCALENDAR2",
        "exe" | "com" | "bat" | "dll" | "sys" => "WINEXEC",
        "txt" => "TEXT",
        "htm" | "html" => "HTML",
        "bin" => "FIRMWARE",
        "aac" => "AAC",
        "flac" | "fla" => "FLAC",
        "mp2" => "MP2",
        "m4a" => "M4A",
        "doc" => "DOC",
        "xml" => "XML",
        "xls" => "XLS",
        "ppt" => "PPT",
        "mht" => "MHT",
        "jp2" => "JP2",
        "jpx" => "JPX",
        _ => "UNKNOWN",
    }
}

/// Extracts the leading extension from a filename (the part after the last
/// `.`), or `""` if there isn't one.
pub fn extension_of(filename: &str) -> &str {
    match filename.rsplit_once('.') {
        Some((_, ext)) => ext,
        None => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_extensions_map_case_insensitively() {
        assert_eq!(from_extension("MP3"), "MP3");
        assert_eq!(from_extension("Jpeg"), "JPEG");
        assert_eq!(from_extension("mov"), "QT");
    }

    #[test]
    fn unknown_extension_maps_to_unknown() {
        assert_eq!(from_extension("xyz"), "UNKNOWN");
    }

    #[test]
    fn extension_of_splits_on_last_dot() {
        assert_eq!(extension_of("archive.tar.gz"), "gz");
        assert_eq!(extension_of("noext"), "");
    }
}
