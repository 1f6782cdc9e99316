//! Structured ordering violations and their text form.
//!
//! The canonical English rendering doubles as the free-text wire format of
//! stores that cannot send the structured payload; `parse_text` is its
//! inverse and the only place that depends on that string shape.

use crate::model::placement::{Quarter, Slot};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

static RELATIVE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(add|move)\b.*?\bpace\s+(-?\d+)\s+would\s+be\s+placed\s+(before|after)\s+pace\s+(-?\d+)\s+at\s+Q([1-4])\s+week\s+([1-9])\b",
    )
    .expect("valid relative violation regex")
});
static POSITION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(add|move)\b.*?\bpace\s+(-?\d+)\s+conflicts\s+with\s+pace\s+(-?\d+)\s+at\s+Q([1-4])\s+week\s+([1-9])\b",
    )
    .expect("valid position violation regex")
});

/// Mutation that produced the violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Add,
    Move,
}

impl OperationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Move => "move",
        }
    }
}

/// Where the placed unit would land relative to the conflicting one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationRelation {
    /// Placed earlier than a unit with a lower order.
    Before,
    /// Placed later than a unit with a higher order.
    After,
    /// Target slot already holds a unit with a lower order.
    PositionConflict,
}

/// Ordering conflict between a placed unit and an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderingViolation {
    pub operation: OperationKind,
    pub relation: ViolationRelation,
    pub order_index: i64,
    pub conflicting_order_index: i64,
    /// Position of the conflicting unit.
    pub position: Slot,
}

/// Localization key plus interpolation parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViolationMessage {
    pub key: &'static str,
    pub params: BTreeMap<&'static str, String>,
}

impl OrderingViolation {
    pub fn message(&self) -> ViolationMessage {
        let key = match (self.operation, self.relation) {
            (OperationKind::Add, ViolationRelation::Before) => "placement.add.before",
            (OperationKind::Add, ViolationRelation::After) => "placement.add.after",
            (OperationKind::Add, ViolationRelation::PositionConflict) => "placement.add.position",
            (OperationKind::Move, ViolationRelation::Before) => "placement.move.before",
            (OperationKind::Move, ViolationRelation::After) => "placement.move.after",
            (OperationKind::Move, ViolationRelation::PositionConflict) => {
                "placement.move.position"
            }
        };
        let mut params = BTreeMap::new();
        params.insert("order", self.order_index.to_string());
        params.insert("conflictingOrder", self.conflicting_order_index.to_string());
        params.insert("quarter", self.position.quarter.label().to_string());
        params.insert("week", self.position.week.to_string());
        ViolationMessage { key, params }
    }

    /// Parses the canonical text rendering, wherever it sits in `text`.
    pub fn parse_text(text: &str) -> Option<Self> {
        if let Some(caps) = RELATIVE_RE.captures(text) {
            let relation = if caps[3].eq_ignore_ascii_case("before") {
                ViolationRelation::Before
            } else {
                ViolationRelation::After
            };
            return Some(Self {
                operation: parse_operation(&caps[1])?,
                relation,
                order_index: caps[2].parse().ok()?,
                conflicting_order_index: caps[4].parse().ok()?,
                position: parse_slot(&caps[5], &caps[6])?,
            });
        }

        let caps = POSITION_RE.captures(text)?;
        Some(Self {
            operation: parse_operation(&caps[1])?,
            relation: ViolationRelation::PositionConflict,
            order_index: caps[2].parse().ok()?,
            conflicting_order_index: caps[3].parse().ok()?,
            position: parse_slot(&caps[4], &caps[5])?,
        })
    }
}

impl Display for OrderingViolation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.relation {
            ViolationRelation::Before | ViolationRelation::After => write!(
                f,
                "{} violation: pace {} would be placed {} pace {} at {}",
                self.operation.as_str(),
                self.order_index,
                if self.relation == ViolationRelation::Before {
                    "before"
                } else {
                    "after"
                },
                self.conflicting_order_index,
                self.position
            ),
            ViolationRelation::PositionConflict => write!(
                f,
                "{} violation: pace {} conflicts with pace {} at {}",
                self.operation.as_str(),
                self.order_index,
                self.conflicting_order_index,
                self.position
            ),
        }
    }
}

impl Error for OrderingViolation {}

fn parse_operation(value: &str) -> Option<OperationKind> {
    match value.to_ascii_lowercase().as_str() {
        "add" => Some(OperationKind::Add),
        "move" => Some(OperationKind::Move),
        _ => None,
    }
}

fn parse_slot(quarter: &str, week: &str) -> Option<Slot> {
    Some(Slot::new(
        Quarter::from_number(quarter.parse().ok()?)?,
        week.parse().ok()?,
    ))
}
