//! Vendor-aware extraction of structured records from CLI text.
//!
//! Every routine accepts blank input and returns an empty result for it.
//! A [`ParseError`] is only returned when the text clearly contains table
//! rows that match no known layout.

mod common;
mod detail;
mod hioso;
mod zte;

pub use common::normalize_mac;
pub use detail::{DetailBlock, DetailField, LabelTable};

use crate::error::ParseError;
use crate::model::{CardStatus, OnuRecord, PonPortAddress, UnconfiguredOnu};

/// Parser selected by the device vendor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseParser {
    ZteGpon,
    HiosoEpon,
}

impl ResponseParser {
    /// Card listing, one entry per recognized row.
    pub fn parse_cards(&self, text: &str) -> Result<Vec<CardStatus>, ParseError> {
        match self {
            ResponseParser::ZteGpon => zte::parse_cards(text),
            ResponseParser::HiosoEpon => hioso::parse_cards(text),
        }
    }

    /// ONU listing for `port`. Rows for other ports are ignored.
    pub fn parse_onu_states(&self, port: PonPortAddress, text: &str) -> Result<Vec<OnuRecord>, ParseError> {
        match self {
            ResponseParser::ZteGpon => zte::parse_onu_states(port, text),
            ResponseParser::HiosoEpon => hioso::parse_onu_states(port, text),
        }
    }

    pub fn detail_labels(&self) -> &'static LabelTable {
        match self {
            ResponseParser::ZteGpon => &zte::DETAIL_LABELS,
            ResponseParser::HiosoEpon => &hioso::DETAIL_LABELS,
        }
    }

    /// Recognized `Label: value` lines of a detail-info response.
    pub fn parse_onu_detail(&self, text: &str) -> DetailBlock {
        DetailBlock::parse(self.detail_labels(), text)
    }

    /// ONUs seen on the fiber but not provisioned.
    pub fn parse_unconfigured(&self, text: &str) -> Result<Vec<UnconfiguredOnu>, ParseError> {
        match self {
            ResponseParser::ZteGpon => zte::parse_unconfigured(text),
            ResponseParser::HiosoEpon => hioso::parse_unconfigured(text),
        }
    }
}
