//! Fixed media-category catalog used by `mediatype:` query constraints.
//!
//! Extension sets are reproduced from the reference implementation's
//! category table, including its composite categories (`audio`, `image`,
//! `text`), which are unions of the narrower sets rather than disjoint from
//! them. Implementers must preserve these exact set memberships — changing
//! them silently changes the meaning of every stored `mediatype:` query
//! (spec §6).

pub struct MediaCategory {
    pub name: &'static str,
    pub extensions: &'static [&'static str],
}

macro_rules! cat {
    ($name:expr, [$($ext:expr),* $(,)?]) => {
        MediaCategory { name: $name, extensions: &[$($ext),*] }
    };
}

pub const ADOBE_PHOTOSHOP: &[&str] = &["pdd", "psb", "psd"];
pub const AFFINITY_PHOTO: &[&str] = &["afphoto"];
pub const ARCHIVE: &[&str] = &["7z", "gz", "rar", "s7z", "tar", "tgz", "zip"];
pub const AUDIO_MIDI: &[&str] = &["mid", "midi"];
/// Union of `_AUDIO_SET` and `_AUDIO_MIDI_SET` — a superset that includes
/// every MIDI extension, not a category disjoint from `audio_midi`.
pub const AUDIO: &[&str] =
    &["aac", "aif", "aiff", "alac", "flac", "m4a", "m4p", "mp3", "mpeg4", "ogg", "wav", "wma", "mid", "midi"];
pub const BLENDER: &[&str] = &[
    "blen_tc", "blend", "blend1", "blend2", "blend3", "blend4", "blend5", "blend6", "blend7", "blend8", "blend9",
    "blend10", "blend11", "blend12", "blend13", "blend14", "blend15", "blend16", "blend17", "blend18", "blend19",
    "blend20", "blend21", "blend22", "blend23", "blend24", "blend25", "blend26", "blend27", "blend28", "blend29",
    "blend30", "blend31", "blend32",
];
pub const DATABASE: &[&str] = &["accdb", "mdb", "sqlite"];
pub const DISK_IMAGE: &[&str] = &["bios", "dmg", "iso"];
pub const DOCUMENT: &[&str] =
    &["doc", "docm", "docx", "dot", "dotm", "dotx", "odt", "pages", "pdf", "rtf", "tex", "wpd", "wps"];
pub const FONT: &[&str] = &["fon", "otf", "ttc", "ttf", "woff", "woff2"];
pub const IMAGE_ANIMATED: &[&str] = &["apng", "gif", "webp", "jxl"];
pub const IMAGE_RAW: &[&str] = &["arw", "cr2", "cr3", "crw", "dng", "nef", "raw", "rw2"];
pub const IMAGE_VECTOR: &[&str] = &["svg"];
/// Union of `_IMAGE_SET`, `_IMAGE_RAW_SET`, and `_IMAGE_VECTOR_SET` — a
/// superset that includes every raw and vector extension, not a category
/// disjoint from `image_raw`/`image_vector`.
pub const IMAGE: &[&str] = &[
    "apng", "avif", "bmp", "exr", "gif", "heic", "heif", "j2k", "jfif", "jp2", "jpeg_large", "jpeg", "jpg_large",
    "jpg", "jpg2", "jxl", "png", "psb", "psd", "tif", "tiff", "webp", "arw", "cr2", "cr3", "crw", "dng", "nef",
    "raw", "rw2", "svg",
];
pub const INSTALLER: &[&str] = &["appx", "msi", "msix"];
pub const MATERIAL: &[&str] = &["mtl"];
pub const MODEL: &[&str] = &["3ds", "fbx", "obj", "stl"];
pub const PACKAGE: &[&str] = &["aab", "akp", "apk", "apkm", "apks", "pkg", "xapk"];
pub const PDF: &[&str] = &["pdf"];
pub const PLAINTEXT: &[&str] = &[
    "bat", "css", "csv", "htm", "html", "ini", "js", "json", "jsonc", "md", "php", "plist", "prefs", "sh", "ts",
    "txt", "xml", "vmt", "fgd", "nut", "cfg", "conf", "vdf", "vcfg", "gi", "inf", "vqlayout", "qss", "vsc", "kv3",
    "vsnd_template",
];
pub const PRESENTATION: &[&str] = &["key", "odp", "ppt", "pptx"];
pub const PROGRAM: &[&str] = &["app", "exe"];
pub const SHORTCUT: &[&str] = &["desktop", "lnk", "url"];
pub const SOURCE_ENGINE: &[&str] = &["vtf"];
pub const SPREADSHEET: &[&str] = &["csv", "numbers", "ods", "xls", "xlsx"];
/// Union of `_DOCUMENT_SET` and `_PLAINTEXT_SET`.
pub const TEXT: &[&str] = &[
    "doc", "docm", "docx", "dot", "dotm", "dotx", "odt", "pages", "pdf", "rtf", "tex", "wpd", "wps", "bat", "css",
    "csv", "htm", "html", "ini", "js", "json", "jsonc", "md", "php", "plist", "prefs", "sh", "ts", "txt", "xml",
    "vmt", "fgd", "nut", "cfg", "conf", "vdf", "vcfg", "gi", "inf", "vqlayout", "qss", "vsc", "kv3", "vsnd_template",
];
pub const VIDEO: &[&str] = &["3gp", "avi", "flv", "gifv", "hevc", "m4p", "m4v", "mkv", "mov", "mp4", "webm", "wmv"];

/// All categories, in the reference implementation's `ALL_CATEGORIES` order.
/// `TEXT` (`document ∪ plaintext`) is a supplement pulled back in from the
/// reference implementation — the distilled spec's category list omitted it
/// (see `SPEC_FULL.md` §11.1).
pub fn all_categories() -> Vec<MediaCategory> {
    vec![
        cat!("adobe_photoshop", ["pdd", "psb", "psd"]),
        cat!("affinity_photo", ["afphoto"]),
        cat!("archive", ["7z", "gz", "rar", "s7z", "tar", "tgz", "zip"]),
        cat!("audio_midi", ["mid", "midi"]),
        cat!(
            "audio",
            ["aac", "aif", "aiff", "alac", "flac", "m4a", "m4p", "mp3", "mpeg4", "ogg", "wav", "wma", "mid", "midi"]
        ),
        cat!(
            "blender",
            [
                "blen_tc", "blend", "blend1", "blend2", "blend3", "blend4", "blend5", "blend6", "blend7", "blend8",
                "blend9", "blend10", "blend11", "blend12", "blend13", "blend14", "blend15", "blend16", "blend17",
                "blend18", "blend19", "blend20", "blend21", "blend22", "blend23", "blend24", "blend25", "blend26",
                "blend27", "blend28", "blend29", "blend30", "blend31", "blend32"
            ]
        ),
        cat!("database", ["accdb", "mdb", "sqlite"]),
        cat!("disk_image", ["bios", "dmg", "iso"]),
        cat!(
            "document",
            ["doc", "docm", "docx", "dot", "dotm", "dotx", "odt", "pages", "pdf", "rtf", "tex", "wpd", "wps"]
        ),
        cat!("font", ["fon", "otf", "ttc", "ttf", "woff", "woff2"]),
        cat!("image_animated", ["apng", "gif", "webp", "jxl"]),
        cat!("image_raw", ["arw", "cr2", "cr3", "crw", "dng", "nef", "raw", "rw2"]),
        cat!(
            "image",
            [
                "apng", "avif", "bmp", "exr", "gif", "heic", "heif", "j2k", "jfif", "jp2", "jpeg_large", "jpeg",
                "jpg_large", "jpg", "jpg2", "jxl", "png", "psb", "psd", "tif", "tiff", "webp", "arw", "cr2", "cr3",
                "crw", "dng", "nef", "raw", "rw2", "svg"
            ]
        ),
        cat!("image_vector", ["svg"]),
        cat!("installer", ["appx", "msi", "msix"]),
        cat!("material", ["mtl"]),
        cat!("model", ["3ds", "fbx", "obj", "stl"]),
        cat!("package", ["aab", "akp", "apk", "apkm", "apks", "pkg", "xapk"]),
        cat!("pdf", ["pdf"]),
        cat!(
            "plaintext",
            [
                "bat", "css", "csv", "htm", "html", "ini", "js", "json", "jsonc", "md", "php", "plist", "prefs",
                "sh", "ts", "txt", "xml", "vmt", "fgd", "nut", "cfg", "conf", "vdf", "vcfg", "gi", "inf", "vqlayout",
                "qss", "vsc", "kv3", "vsnd_template"
            ]
        ),
        cat!("presentation", ["key", "odp", "ppt", "pptx"]),
        cat!("program", ["app", "exe"]),
        cat!("shortcut", ["desktop", "lnk", "url"]),
        cat!("source_engine", ["vtf"]),
        cat!("spreadsheet", ["csv", "numbers", "ods", "xls", "xlsx"]),
        cat!(
            "text",
            [
                "doc", "docm", "docx", "dot", "dotm", "dotx", "odt", "pages", "pdf", "rtf", "tex", "wpd", "wps",
                "bat", "css", "csv", "htm", "html", "ini", "js", "json", "jsonc", "md", "php", "plist", "prefs",
                "sh", "ts", "txt", "xml", "vmt", "fgd", "nut", "cfg", "conf", "vdf", "vcfg", "gi", "inf",
                "vqlayout", "qss", "vsc", "kv3", "vsnd_template"
            ]
        ),
        cat!("video", ["3gp", "avi", "flv", "gifv", "hevc", "m4p", "m4v", "mkv", "mov", "mp4", "webm", "wmv"]),
    ]
}

/// Extension set for a named category, or `None` if the name isn't one of
/// the fixed categories.
pub fn extensions_for(category: &str) -> Option<Vec<&'static str>> {
    all_categories()
        .into_iter()
        .find(|c| c.name == category)
        .map(|c| c.extensions.to_vec())
}

/// Filetype equivalence classes (spec §4.6, supplemented per `SPEC_FULL.md`
/// §11.3 since the source table wasn't recoverable from the retrieved
/// corpus). An extension with no entry here maps to its own singleton set.
const FILETYPE_EQUIVALENTS: &[&[&str]] = &[
    &["jpg", "jpeg", "jfif", "jpg_large", "jpeg_large"],
    &["tif", "tiff"],
    &["htm", "html"],
    &["yml", "yaml"],
    &["mpg", "mpeg"],
    &["jpg2", "jp2"],
];

pub fn filetype_equivalency_list(item: &str) -> Vec<&'static str> {
    for class in FILETYPE_EQUIVALENTS {
        if class.iter().any(|e| e.eq_ignore_ascii_case(item)) {
            return class.to_vec();
        }
    }
    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audio_is_a_superset_of_audio_midi() {
        let audio = extensions_for("audio").unwrap();
        let midi = extensions_for("audio_midi").unwrap();
        assert!(audio.contains(&"flac"));
        assert!(audio.contains(&"mid"));
        assert!(audio.contains(&"midi"));
        assert!(midi.contains(&"mid"));
        assert!(midi.contains(&"midi"));
    }

    #[test]
    fn image_is_a_superset_of_image_raw_and_image_vector() {
        let image = extensions_for("image").unwrap();
        let raw = extensions_for("image_raw").unwrap();
        let vector = extensions_for("image_vector").unwrap();
        assert!(image.contains(&"png"));
        for ext in &raw {
            assert!(image.contains(ext));
        }
        for ext in &vector {
            assert!(image.contains(ext));
        }
    }

    #[test]
    fn filetype_equivalence_groups_jpg_variants() {
        let class = filetype_equivalency_list("jpg");
        assert!(class.contains(&"jpeg"));
        assert!(class.contains(&"jfif"));
    }

    #[test]
    fn unknown_extension_has_no_equivalence_class() {
        assert!(filetype_equivalency_list("xyz").is_empty());
    }

    #[test]
    fn text_category_unions_document_and_plaintext() {
        let text = extensions_for("text").unwrap();
        assert!(text.contains(&"doc"));
        assert!(text.contains(&"txt"));
    }
}
