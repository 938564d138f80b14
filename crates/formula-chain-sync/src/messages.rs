//! Sync protocol line grammar.
//!
//! Every message is one newline-terminated ASCII line, `KEYWORD [args]`.
//! A `BLOCK <step> <len>` line is followed by exactly `len` bytes of
//! canonical record and a newline.

use std::fmt;

use formula_chain_core::Sha256Hash;

use crate::error::{Result, SyncError};

/// Current protocol version, sent as `SYNC/<n>`.
pub const PROTOCOL_VERSION: u32 = 1;

/// Message size limits.
pub mod limits {
    /// Max bytes in one protocol line, excluding the terminator.
    pub const MAX_LINE_LEN: usize = 4096;
    /// Max non-`BLOCK` lines a peer may send in one connection.
    pub const MAX_HANDSHAKE_LINES: usize = 64;
    /// Max bytes in one block frame.
    pub const MAX_FRAME_LEN: usize = 4 * 1024 * 1024;
}

/// Whether the serving side considers the puller's ruleset its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerStatus {
    Ok,
    Foreign,
}

impl PeerStatus {
    fn as_str(self) -> &'static str {
        match self {
            PeerStatus::Ok => "ok",
            PeerStatus::Foreign => "foreign",
        }
    }
}

/// One protocol line.
#[derive(Debug, Clone, PartialEq)]
pub enum Line {
    /// `SYNC/<version>`
    Banner(u32),
    /// `NODE <id>`
    Node(String),
    /// `FP <hex>`; empty when the sender has no fingerprint.
    Fp(Option<Sha256Hash>),
    /// `HEIGHT <n>`: chain length.
    Height(u64),
    /// `HASH <hex>`; empty for an empty chain.
    Hash(Option<Sha256Hash>),
    /// `REQUEST <step>`: first step the puller is missing.
    Request(u64),
    /// `TRUST <ratio>`
    Trust(f64),
    /// `STATUS ok|foreign`
    Status(PeerStatus),
    /// `BLOCK <step> <len>`, header of a frame.
    Block { step: u64, len: usize },
    /// `END`
    End,
    /// Any other keyword. Kept for logging and otherwise ignored.
    Unknown(String),
}

impl Line {
    /// Parse one line (without terminator).
    ///
    /// Unknown keywords parse to [`Line::Unknown`]; a known keyword with bad
    /// arguments is a protocol error.
    pub fn parse(line: &str) -> Result<Line> {
        let (keyword, rest) = line.split_once(' ').unwrap_or((line, ""));

        if let Some(version) = keyword.strip_prefix("SYNC/") {
            return version
                .parse()
                .map(Line::Banner)
                .map_err(|_| SyncError::protocol(format!("bad banner `{}`", line)));
        }

        let parsed = match keyword {
            "NODE" => Line::Node(rest.to_string()),
            "FP" => Line::Fp(parse_opt_hash(keyword, rest)?),
            "HEIGHT" => Line::Height(parse_num(keyword, rest)?),
            "HASH" => Line::Hash(parse_opt_hash(keyword, rest)?),
            "REQUEST" => Line::Request(parse_num(keyword, rest)?),
            "TRUST" => Line::Trust(parse_num(keyword, rest)?),
            "STATUS" => Line::Status(match rest {
                "ok" => PeerStatus::Ok,
                "foreign" => PeerStatus::Foreign,
                other => {
                    return Err(SyncError::protocol(format!("bad STATUS `{}`", other)));
                }
            }),
            "BLOCK" => {
                let mut args = rest.split(' ');
                let (Some(step), Some(len), None) = (args.next(), args.next(), args.next()) else {
                    return Err(SyncError::protocol(format!("bad BLOCK header `{}`", line)));
                };
                let step = parse_num(keyword, step)?;
                let len: usize = parse_num(keyword, len)?;
                if len > limits::MAX_FRAME_LEN {
                    return Err(SyncError::protocol(format!(
                        "frame of {} bytes exceeds limit",
                        len
                    )));
                }
                Line::Block { step, len }
            }
            "END" => Line::End,
            _ => Line::Unknown(line.to_string()),
        };
        Ok(parsed)
    }
}

fn parse_num<T: std::str::FromStr>(keyword: &str, arg: &str) -> Result<T> {
    arg.parse()
        .map_err(|_| SyncError::protocol(format!("bad {} argument `{}`", keyword, arg)))
}

fn parse_opt_hash(keyword: &str, arg: &str) -> Result<Option<Sha256Hash>> {
    if arg.is_empty() {
        return Ok(None);
    }
    Sha256Hash::from_hex(arg)
        .map(Some)
        .map_err(|_| SyncError::protocol(format!("bad {} hash `{}`", keyword, arg)))
}

fn opt_hex(hash: &Option<Sha256Hash>) -> String {
    hash.map(|h| h.to_hex()).unwrap_or_default()
}

impl fmt::Display for Line {
    /// The wire form, without terminator.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Line::Banner(v) => write!(f, "SYNC/{}", v),
            Line::Node(id) => write!(f, "NODE {}", id),
            Line::Fp(fp) => write!(f, "FP {}", opt_hex(fp)),
            Line::Height(h) => write!(f, "HEIGHT {}", h),
            Line::Hash(h) => write!(f, "HASH {}", opt_hex(h)),
            Line::Request(step) => write!(f, "REQUEST {}", step),
            Line::Trust(ratio) => write!(f, "TRUST {}", ratio),
            Line::Status(s) => write!(f, "STATUS {}", s.as_str()),
            Line::Block { step, len } => write!(f, "BLOCK {} {}", step, len),
            Line::End => f.write_str("END"),
            Line::Unknown(raw) => f.write_str(raw),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_keywords() {
        let h = Sha256Hash::hash(b"x");
        let cases = vec![
            ("SYNC/1", Line::Banner(1)),
            ("NODE node-a", Line::Node("node-a".into())),
            ("FP ", Line::Fp(None)),
            ("HEIGHT 12", Line::Height(12)),
            ("HASH ", Line::Hash(None)),
            ("REQUEST 0", Line::Request(0)),
            ("TRUST 0.5", Line::Trust(0.5)),
            ("STATUS foreign", Line::Status(PeerStatus::Foreign)),
            ("BLOCK 3 120", Line::Block { step: 3, len: 120 }),
            ("END", Line::End),
        ];
        for (text, expected) in cases {
            assert_eq!(Line::parse(text).unwrap(), expected, "{}", text);
        }

        let fp_line = format!("FP {}", h.to_hex());
        assert_eq!(Line::parse(&fp_line).unwrap(), Line::Fp(Some(h)));
        let upper = format!("HASH {}", h.to_hex().to_uppercase());
        assert_eq!(Line::parse(&upper).unwrap(), Line::Hash(Some(h)));
    }

    #[test]
    fn test_display_matches_wire() {
        let h = Sha256Hash::hash(b"x");
        assert_eq!(Line::Banner(PROTOCOL_VERSION).to_string(), "SYNC/1");
        assert_eq!(Line::Fp(None).to_string(), "FP ");
        assert_eq!(Line::Hash(Some(h)).to_string(), format!("HASH {}", h.to_hex()));
        assert_eq!(Line::Trust(0.25).to_string(), "TRUST 0.25");
        assert_eq!(Line::Block { step: 7, len: 9 }.to_string(), "BLOCK 7 9");
        assert_eq!(Line::Status(PeerStatus::Ok).to_string(), "STATUS ok");

        let line = Line::Request(41);
        assert_eq!(Line::parse(&line.to_string()).unwrap(), line);
    }

    #[test]
    fn test_unknown_keyword_is_kept() {
        assert_eq!(
            Line::parse("PING 1 2").unwrap(),
            Line::Unknown("PING 1 2".into())
        );
        assert_eq!(Line::parse("").unwrap(), Line::Unknown(String::new()));
    }

    #[test]
    fn test_bad_arguments_are_protocol_errors() {
        for text in [
            "SYNC/x",
            "HEIGHT -1",
            "HEIGHT",
            "REQUEST abc",
            "TRUST high",
            "FP nothex",
            "STATUS maybe",
            "BLOCK 1",
            "BLOCK 1 2 3",
            "BLOCK 1 99999999999",
        ] {
            assert!(
                matches!(Line::parse(text), Err(SyncError::Protocol(_))),
                "{}",
                text
            );
        }
    }
}
