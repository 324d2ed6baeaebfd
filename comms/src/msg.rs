use std::{borrow::Cow, io};

use crate::{Deserialize, Serialize};

type Header = u32;
const HEADER_SIZE: usize = size_of::<Header>();

const ERR_KIND: Header = 0;
const CONTROL_KIND: Header = 1;
const WEIGHTS_KIND: Header = 2;
const REPORT_KIND: Header = 3;

/// Size of the fixed fields of a `Payload::Weights` frame after the header.
const WEIGHTS_FIELDS: usize = size_of::<u32>();

/// Size of the fixed fields of a `Payload::Report` frame after the header.
const REPORT_FIELDS: usize = size_of::<u32>() + 2 * size_of::<f32>() + 2 * size_of::<u64>();

/// A worker's partial result for one iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Report<'a> {
    pub iteration: u32,
    pub train_error: f32,
    pub validation_error: f32,
    pub train_size: u64,
    /// Records held out for validation, 0 when `validation_error` measured nothing.
    pub validation_size: u64,
    pub gradient: &'a [f32],
}

/// The payload data for the `Data` variant of the `Msg` enum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Payload<'a> {
    /// The master's weights for the given iteration.
    Weights { iteration: u32, weights: &'a [f32] },
    /// A worker's answer to a weights broadcast.
    Report(Report<'a>),
}

/// The command for the `Control` variant of the `Msg` enum.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    /// Compute `iteration` with the initial weights derived from the shared configuration.
    Start { iteration: u32 },
    Disconnect,
}

/// The application layer message for the entire system.
#[derive(Debug, Clone, PartialEq)]
pub enum Msg<'a> {
    Control(Command),
    Data(Payload<'a>),
    Err(Cow<'a, str>),
}

impl Msg<'_> {
    /// Returns a short name of the message kind, for logs and errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Msg::Control(Command::Start { .. }) => "control/start",
            Msg::Control(Command::Disconnect) => "control/disconnect",
            Msg::Data(Payload::Weights { .. }) => "data/weights",
            Msg::Data(Payload::Report(_)) => "data/report",
            Msg::Err(_) => "err",
        }
    }

    fn buf_is_too_small<T>(size: usize, needed: usize) -> io::Result<T> {
        Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("The given buffer is too small {size}, must at least be {needed} bytes"),
        ))
    }

    fn invalid_kind<T>(kind: Header) -> io::Result<T> {
        Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Received an invalid kind header {kind}"),
        ))
    }

    fn cast_floats(buf: &[u8]) -> io::Result<&[f32]> {
        bytemuck::try_cast_slice(buf)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, format!("{e:?}")))
    }
}

impl<'a> Serialize<'a> for Msg<'a> {
    fn serialize(&'a self, buf: &mut Vec<u8>) -> Option<&'a [u8]> {
        match self {
            Msg::Err(e) => {
                buf.extend_from_slice(&ERR_KIND.to_be_bytes());
                Some(e.as_bytes())
            }
            Msg::Control(cmd) => {
                buf.extend_from_slice(&CONTROL_KIND.to_be_bytes());

                // SAFETY: Serialize impl for `Command` is derived and not implemented
                //         by hand. Nor has a non string-key map inside.
                serde_json::to_writer(buf, &cmd).unwrap();
                None
            }
            Msg::Data(Payload::Weights { iteration, weights }) => {
                buf.extend_from_slice(&WEIGHTS_KIND.to_be_bytes());
                buf.extend_from_slice(&iteration.to_be_bytes());
                Some(bytemuck::cast_slice(weights))
            }
            Msg::Data(Payload::Report(report)) => {
                buf.extend_from_slice(&REPORT_KIND.to_be_bytes());
                buf.extend_from_slice(&report.iteration.to_be_bytes());
                buf.extend_from_slice(&report.train_error.to_be_bytes());
                buf.extend_from_slice(&report.validation_error.to_be_bytes());
                buf.extend_from_slice(&report.train_size.to_be_bytes());
                buf.extend_from_slice(&report.validation_size.to_be_bytes());
                Some(bytemuck::cast_slice(report.gradient))
            }
        }
    }
}

impl<'a> Deserialize<'a> for Msg<'a> {
    fn deserialize(buf: &'a [u8]) -> io::Result<Self> {
        if buf.len() < HEADER_SIZE {
            return Self::buf_is_too_small(buf.len(), HEADER_SIZE);
        }

        let (kind_buf, rest) = buf.split_at(HEADER_SIZE);

        // SAFETY: We splitted the buffer to be of size `HEADER_SIZE` just above.
        let kind = Header::from_be_bytes(kind_buf.try_into().unwrap());

        match kind {
            ERR_KIND => {
                let string = str::from_utf8(rest)
                    .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;

                Ok(Self::Err(Cow::Borrowed(string)))
            }
            CONTROL_KIND => {
                let cmd = serde_json::from_slice(rest)?;
                Ok(Self::Control(cmd))
            }
            WEIGHTS_KIND => {
                if rest.len() < WEIGHTS_FIELDS {
                    return Self::buf_is_too_small(buf.len(), HEADER_SIZE + WEIGHTS_FIELDS);
                }

                let (fields, tail) = rest.split_at(WEIGHTS_FIELDS);
                let iteration = u32::from_be_bytes(fields.try_into().unwrap());
                let weights = Self::cast_floats(tail)?;

                Ok(Self::Data(Payload::Weights { iteration, weights }))
            }
            REPORT_KIND => {
                if rest.len() < REPORT_FIELDS {
                    return Self::buf_is_too_small(buf.len(), HEADER_SIZE + REPORT_FIELDS);
                }

                // SAFETY: `fields` is exactly `REPORT_FIELDS` long.
                let (fields, tail) = rest.split_at(REPORT_FIELDS);
                let report = Report {
                    iteration: u32::from_be_bytes(fields[0..4].try_into().unwrap()),
                    train_error: f32::from_be_bytes(fields[4..8].try_into().unwrap()),
                    validation_error: f32::from_be_bytes(fields[8..12].try_into().unwrap()),
                    train_size: u64::from_be_bytes(fields[12..20].try_into().unwrap()),
                    validation_size: u64::from_be_bytes(fields[20..28].try_into().unwrap()),
                    gradient: Self::cast_floats(tail)?,
                };

                Ok(Self::Data(Payload::Report(report)))
            }
            kind => Self::invalid_kind(kind),
        }
    }
}
