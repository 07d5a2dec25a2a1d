//! Build script parser
//!
//! A script is a line-oriented text file framed by `[BEGINVDF]` and
//! `[ENDVDF]`:
//!
//! ```text
//! [BEGINVDF]
//! Comment=Built on %%N a rainy day
//! BaseDir=.\
//! VDFName=.\Demo.vdf
//! [FILES]
//! _Work\* -r
//! [EXCLUDE]
//! *.vdf -r
//! [INCLUDE]
//! Demo_Original.vdf -r
//! [ENDVDF]
//! ```
//!
//! Lines starting with `;` are comments. `[FILES]`, `[EXCLUDE]` and
//! `[INCLUDE]` are optional, may appear in any order and may repeat.

use crate::engine::BuildRequest;
use crate::error::{Result, VdfsError};
use std::path::{Path, MAIN_SEPARATOR};

const COMMENT_KEY: &str = "Comment=";
const BASE_DIR_KEY: &str = "BaseDir=";
const VDF_NAME_KEY: &str = "VDFName=";

/// Two-character escape in `Comment=` values that expands to CRLF
const COMMENT_NEWLINE_ESCAPE: &str = "%%N";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParserState {
    Initial,
    Begin,
    End,
    Files,
    Exclude,
    Include,
}

const SECTIONS: [(&str, ParserState); 5] = [
    ("[BEGINVDF]", ParserState::Begin),
    ("[FILES]", ParserState::Files),
    ("[EXCLUDE]", ParserState::Exclude),
    ("[INCLUDE]", ParserState::Include),
    ("[ENDVDF]", ParserState::End),
];

/// Return the state a marker line switches to, if the line is a marker
fn section_marker(trimmed: &str) -> Option<ParserState> {
    SECTIONS
        .iter()
        .find(|(marker, _)| *marker == trimmed)
        .map(|(_, state)| *state)
}

/// Rules are stored with the host path separator
fn host_separators(line: &str) -> String {
    line.replace('\\', &MAIN_SEPARATOR.to_string())
}

/// Read and parse a build script from disk
pub fn parse_script<P: AsRef<Path>>(path: P) -> Result<BuildRequest> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|e| VdfsError::source_io(path, e))?;
    parse_script_bytes(&bytes).map_err(|e| match e {
        VdfsError::MalformedScript(msg) => {
            VdfsError::MalformedScript(format!("{}: {}", path.display(), msg))
        }
        other => other,
    })
}

/// Parse a script from raw bytes; invalid UTF-8 is replaced, not rejected
pub fn parse_script_bytes(bytes: &[u8]) -> Result<BuildRequest> {
    parse_script_str(&String::from_utf8_lossy(bytes))
}

/// Parse script text into a build request
pub fn parse_script_str(text: &str) -> Result<BuildRequest> {
    let mut request = BuildRequest::default();
    let mut state = ParserState::Initial;

    for line in text.lines() {
        if line.starts_with(';') {
            continue;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if let Some(next) = section_marker(trimmed) {
            state = next;
            continue;
        }

        match state {
            ParserState::Initial | ParserState::End => {}
            ParserState::Begin => {
                if let Some(value) = line.strip_prefix(COMMENT_KEY) {
                    request.comment = value.replace(COMMENT_NEWLINE_ESCAPE, "\r\n");
                } else if let Some(value) = line.strip_prefix(BASE_DIR_KEY) {
                    request.base_dir = value.to_string();
                } else if let Some(value) = line.strip_prefix(VDF_NAME_KEY) {
                    request.archive_name = value.to_string();
                }
            }
            ParserState::Files => request.file_rules.push(host_separators(line)),
            ParserState::Exclude => request.exclude_rules.push(host_separators(line)),
            ParserState::Include => request.include_rules.push(host_separators(line)),
        }
    }

    if state != ParserState::End {
        return Err(VdfsError::MalformedScript(format!(
            "script does not end with an [ENDVDF] section (last state: {:?})",
            state
        )));
    }

    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host(rule: &str) -> String {
        rule.replace('\\', &MAIN_SEPARATOR.to_string())
    }

    #[test]
    fn test_parse_complete_script() {
        let content = r"[BEGINVDF]
Comment=This is a comment for the VDF that will be generated
BaseDir=.\
VDFName=.\Demo.vdf
[FILES]
_Work\* -r
* -r
[EXCLUDE]
DESKTOP.INI -r
*.vdf -r
*.vm
*.exe
[INCLUDE]
Demo_Original.vdf -r
[ENDVDF]
";

        let request = parse_script_str(content).unwrap();

        assert_eq!(
            request.comment,
            "This is a comment for the VDF that will be generated"
        );
        assert_eq!(request.base_dir, r".\");
        assert_eq!(request.archive_name, r".\Demo.vdf");

        assert_eq!(request.file_rules, vec![host(r"_Work\* -r"), "* -r".to_string()]);
        assert_eq!(
            request.exclude_rules,
            vec!["DESKTOP.INI -r", "*.vdf -r", "*.vm", "*.exe"]
        );
        assert_eq!(request.include_rules, vec!["Demo_Original.vdf -r"]);
    }

    #[test]
    fn test_parse_minimal_script() {
        let request = parse_script_str("[BEGINVDF]\nBaseDir=BaseDir\nVDFName=VDFName.vdf\n[ENDVDF]")
            .unwrap();

        assert_eq!(request.base_dir, "BaseDir");
        assert_eq!(request.archive_name, "VDFName.vdf");
        assert!(request.comment.is_empty());
        assert!(request.file_rules.is_empty());
    }

    #[test]
    fn test_missing_end_section_is_malformed() {
        let result = parse_script_str("[BEGINVDF]\nVDFName=x.vdf\n[FILES]\n*\n");
        assert!(matches!(result, Err(VdfsError::MalformedScript(_))));

        let result = parse_script_str("");
        assert!(matches!(result, Err(VdfsError::MalformedScript(_))));
    }

    #[test]
    fn test_end_must_be_final_section() {
        let result = parse_script_str("[BEGINVDF]\n[ENDVDF]\n[FILES]\n* -r\n");
        assert!(matches!(result, Err(VdfsError::MalformedScript(_))));
    }

    #[test]
    fn test_comment_newline_escape() {
        let request = parse_script_str("[BEGINVDF]\nComment=Hello%%NWorld\n[ENDVDF]").unwrap();
        assert_eq!(request.comment, "Hello\r\nWorld");
    }

    #[test]
    fn test_comment_prefix_stripped_once() {
        let request =
            parse_script_str("[BEGINVDF]\nComment=Comment=%%NWith%%NNewLines\n[ENDVDF]").unwrap();
        assert_eq!(request.comment, "Comment=\r\nWith\r\nNewLines");
    }

    #[test]
    fn test_markers_ignore_surrounding_whitespace() {
        let result = parse_script_str("\t[BEGINVDF]    \n    [ENDVDF]\t");
        assert!(result.is_ok());
    }

    #[test]
    fn test_comment_lines_and_blanks_skipped() {
        let content = "; header comment\n[BEGINVDF]\n\n; VDFName=ignored.vdf\nVDFName=kept.vdf\n[FILES]\n;*.tmp\n   \n*.txt\n[ENDVDF]\n";
        let request = parse_script_str(content).unwrap();

        assert_eq!(request.archive_name, "kept.vdf");
        assert_eq!(request.file_rules, vec!["*.txt"]);
    }

    #[test]
    fn test_sections_may_repeat() {
        let content = "[BEGINVDF]\n[FILES]\na.txt\n[EXCLUDE]\nb.txt\n[FILES]\nc.txt\n[FILES]\nd.txt\n[ENDVDF]\n";
        let request = parse_script_str(content).unwrap();

        assert_eq!(request.file_rules, vec!["a.txt", "c.txt", "d.txt"]);
        assert_eq!(request.exclude_rules, vec!["b.txt"]);
    }

    #[test]
    fn test_rules_keep_surrounding_text() {
        let content = "[BEGINVDF]\n[FILES]\n  spaced.txt \n[ENDVDF]\n";
        let request = parse_script_str(content).unwrap();
        assert_eq!(request.file_rules, vec!["  spaced.txt "]);
    }

    #[test]
    fn test_crlf_line_endings() {
        let content = "[BEGINVDF]\r\nVDFName=crlf.vdf\r\n[FILES]\r\n* -r\r\n[ENDVDF]\r\n";
        let request = parse_script_str(content).unwrap();

        assert_eq!(request.archive_name, "crlf.vdf");
        assert_eq!(request.file_rules, vec!["* -r"]);
    }

    #[test]
    fn test_keys_outside_begin_are_rules_or_ignored() {
        let content = "VDFName=early.vdf\n[BEGINVDF]\n[FILES]\nVDFName=rule.vdf\n[ENDVDF]\nVDFName=late.vdf\n";
        let request = parse_script_str(content).unwrap();

        assert!(request.archive_name.is_empty());
        assert_eq!(request.file_rules, vec!["VDFName=rule.vdf"]);
    }

    #[test]
    fn test_parse_script_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("demo.vm");
        std::fs::write(&path, "[BEGINVDF]\nVDFName=disk.vdf\n[ENDVDF]\n").unwrap();

        let request = parse_script(&path).unwrap();
        assert_eq!(request.archive_name, "disk.vdf");

        let missing = parse_script(dir.path().join("missing.vm"));
        assert!(matches!(missing, Err(VdfsError::SourceIo { .. })));
    }
}
