/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Correlation rules.
//!
//! A rule decides whether an inbound message answers a particular request.
//! Rules are built from the request before it is transmitted, so a reply that
//! arrives while the transport is still sending is not lost. Once the
//! transport returns, [`CorrelationRule::on_sent`] hands the rule the message
//! as sent; the stamped MsgSeqNum becomes matchable from that point on.
//!
//! The default [`ReferenceRuleFactory`] matches a response when
//! - one of its reference fields carries the request's identifier, using a
//!   per-request-type table of identifier and reference tags, or
//! - its RefSeqNum (45) equals the request's MsgSeqNum (34), or
//! - a pluggable secondary comparison accepts the pair (never, by default).

use ironlink_core::field::tags;
use ironlink_core::message::{Message, MsgType};
use ironlink_core::types::SeqNum;
use smallvec::{SmallVec, smallvec};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Predicate testing whether an inbound message is a reply.
pub trait CorrelationRule: Send + Sync {
    /// Returns true if `message` correlates with this rule.
    fn matches(&self, message: &Message) -> bool;

    /// Called once with the request as the transport sent it.
    fn on_sent(&self, _sent: &Message) {}
}

impl<F> CorrelationRule for F
where
    F: Fn(&Message) -> bool + Send + Sync,
{
    fn matches(&self, message: &Message) -> bool {
        self(message)
    }
}

/// Shared, type-erased correlation rule.
pub type SharedRule = Arc<dyn CorrelationRule>;

/// Matches messages whose `tag` equals `value`.
#[must_use]
pub fn match_field(tag: u32, value: impl Into<String>) -> SharedRule {
    let value = value.into();
    Arc::new(move |message: &Message| message.get_field_str(tag) == Some(value.as_str()))
}

/// Matches messages carrying the given ClOrdID.
#[must_use]
pub fn match_cl_ord_id(id: impl Into<String>) -> SharedRule {
    match_field(tags::CL_ORD_ID, id)
}

/// Matches every message of the given type.
#[must_use]
pub fn match_msg_type(msg_type: MsgType) -> SharedRule {
    Arc::new(move |message: &Message| *message.msg_type() == msg_type)
}

/// Derives a correlation rule from a sent request.
pub trait RuleFactory: Send + Sync {
    /// Builds the rule for replies to `request`.
    fn rule_for(&self, request: &Message) -> SharedRule;
}

impl<F> RuleFactory for F
where
    F: Fn(&Message) -> SharedRule + Send + Sync,
{
    fn rule_for(&self, request: &Message) -> SharedRule {
        self(request)
    }
}

/// Extra `(request, response)` comparison consulted after the reference fields.
pub type SecondaryComparison = Arc<dyn Fn(&Message, &Message) -> bool + Send + Sync>;

/// Identifier and reference tags for one request type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceMapping {
    /// Tag on the request holding its identifier.
    pub id_tag: u32,
    /// Tags on a response that may echo the identifier.
    pub reference_tags: SmallVec<[u32; 4]>,
}

impl ReferenceMapping {
    /// Creates a mapping from an identifier tag and candidate reference tags.
    #[must_use]
    pub fn new(id_tag: u32, reference_tags: &[u32]) -> Self {
        Self {
            id_tag,
            reference_tags: SmallVec::from_slice(reference_tags),
        }
    }

    /// Same tag on both sides plus BusinessRejectRefID.
    fn echoed(id_tag: u32) -> Self {
        Self {
            id_tag,
            reference_tags: smallvec![id_tag, tags::BUSINESS_REJECT_REF_ID],
        }
    }
}

/// Rule produced by [`ReferenceRuleFactory`].
#[derive(Clone)]
pub struct ReferenceRule {
    request_id: Option<String>,
    reference_tags: SmallVec<[u32; 4]>,
    request_seq: OnceLock<SeqNum>,
    request: Arc<Message>,
    secondary: Option<SecondaryComparison>,
}

impl ReferenceRule {
    /// Returns the captured request identifier, if the request carried one.
    #[must_use]
    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    /// Returns the captured request sequence number, if stamped.
    #[must_use]
    pub fn request_seq(&self) -> Option<SeqNum> {
        self.request_seq.get().copied()
    }
}

impl CorrelationRule for ReferenceRule {
    fn matches(&self, message: &Message) -> bool {
        if let Some(id) = self.request_id.as_deref()
            && self
                .reference_tags
                .iter()
                .any(|tag| message.get_field_str(*tag) == Some(id))
        {
            return true;
        }

        if let Some(seq) = self.request_seq()
            && message.get_field_as::<SeqNum>(tags::REF_SEQ_NUM) == Some(seq)
        {
            return true;
        }

        self.secondary
            .as_ref()
            .is_some_and(|compare| compare(&self.request, message))
    }

    fn on_sent(&self, sent: &Message) {
        if let Some(seq) = sent.seq_num() {
            self.request_seq.get_or_init(|| seq);
        }
    }
}

impl fmt::Debug for ReferenceRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReferenceRule")
            .field("request_id", &self.request_id)
            .field("reference_tags", &self.reference_tags)
            .field("request_seq", &self.request_seq())
            .field("secondary", &self.secondary.is_some())
            .finish()
    }
}

/// Default rule factory driven by a request-type table.
#[derive(Clone)]
pub struct ReferenceRuleFactory {
    mappings: HashMap<MsgType, ReferenceMapping>,
    secondary: Option<SecondaryComparison>,
}

impl ReferenceRuleFactory {
    /// Creates a factory with the standard request-type table.
    #[must_use]
    pub fn new() -> Self {
        let mut mappings = HashMap::new();
        for msg_type in [
            MsgType::NewOrderSingle,
            MsgType::OrderCancelRequest,
            MsgType::OrderCancelReplaceRequest,
            MsgType::OrderMassCancelRequest,
        ] {
            mappings.insert(msg_type, ReferenceMapping::echoed(tags::CL_ORD_ID));
        }
        mappings.insert(
            MsgType::OrderStatusRequest,
            ReferenceMapping::new(
                tags::CL_ORD_ID,
                &[
                    tags::CL_ORD_ID,
                    tags::ORD_STATUS_REQ_ID,
                    tags::BUSINESS_REJECT_REF_ID,
                ],
            ),
        );
        mappings.insert(MsgType::NewOrderList, ReferenceMapping::echoed(tags::LIST_ID));
        mappings.insert(MsgType::QuoteRequest, ReferenceMapping::echoed(tags::QUOTE_REQ_ID));
        mappings.insert(
            MsgType::QuoteStatusRequest,
            ReferenceMapping::echoed(tags::QUOTE_STATUS_REQ_ID),
        );
        mappings.insert(MsgType::MassQuote, ReferenceMapping::echoed(tags::QUOTE_ID));
        mappings.insert(MsgType::MarketDataRequest, ReferenceMapping::echoed(tags::MD_REQ_ID));
        mappings.insert(
            MsgType::SecurityDefinitionRequest,
            ReferenceMapping::echoed(tags::SECURITY_REQ_ID),
        );
        mappings.insert(
            MsgType::SecurityListRequest,
            ReferenceMapping::echoed(tags::SECURITY_REQ_ID),
        );
        mappings.insert(
            MsgType::SecurityStatusRequest,
            ReferenceMapping::echoed(tags::SECURITY_STATUS_REQ_ID),
        );
        mappings.insert(
            MsgType::TradingSessionStatusRequest,
            ReferenceMapping::echoed(tags::TRAD_SES_REQ_ID),
        );
        mappings.insert(
            MsgType::RequestForPositions,
            ReferenceMapping::echoed(tags::POS_REQ_ID),
        );
        mappings.insert(
            MsgType::CollateralInquiry,
            ReferenceMapping::echoed(tags::COLL_INQUIRY_ID),
        );
        mappings.insert(
            MsgType::TestRequest,
            ReferenceMapping::new(tags::TEST_REQ_ID, &[tags::TEST_REQ_ID]),
        );

        Self {
            mappings,
            secondary: None,
        }
    }

    /// Overrides or adds the mapping for one request type.
    #[must_use]
    pub fn with_mapping(mut self, msg_type: MsgType, mapping: ReferenceMapping) -> Self {
        self.mappings.insert(msg_type, mapping);
        self
    }

    /// Installs a secondary comparison consulted after the reference fields.
    #[must_use]
    pub fn with_secondary<F>(mut self, compare: F) -> Self
    where
        F: Fn(&Message, &Message) -> bool + Send + Sync + 'static,
    {
        self.secondary = Some(Arc::new(compare));
        self
    }

    /// Returns the mapping for a request type, if any.
    #[must_use]
    pub fn mapping(&self, msg_type: &MsgType) -> Option<&ReferenceMapping> {
        self.mappings.get(msg_type)
    }

    /// Builds the concrete rule for `request`.
    #[must_use]
    pub fn reference_rule(&self, request: &Message) -> ReferenceRule {
        let (request_id, reference_tags) = match self.mappings.get(request.msg_type()) {
            Some(mapping) => (
                request.get_field_str(mapping.id_tag).map(str::to_owned),
                mapping.reference_tags.clone(),
            ),
            None => (None, SmallVec::new()),
        };

        let request_seq = request.seq_num().map_or_else(OnceLock::new, OnceLock::from);

        ReferenceRule {
            request_id,
            reference_tags,
            request_seq,
            request: Arc::new(request.clone()),
            secondary: self.secondary.clone(),
        }
    }
}

impl Default for ReferenceRuleFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleFactory for ReferenceRuleFactory {
    fn rule_for(&self, request: &Message) -> SharedRule {
        Arc::new(self.reference_rule(request))
    }
}

impl fmt::Debug for ReferenceRuleFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReferenceRuleFactory")
            .field("mappings", &self.mappings.len())
            .field("secondary", &self.secondary.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_order(cl_ord_id: &str, seq: u64) -> Message {
        Message::new(MsgType::NewOrderSingle)
            .with_field(tags::CL_ORD_ID, cl_ord_id)
            .with_field(tags::MSG_SEQ_NUM, seq.to_string())
    }

    #[test]
    fn test_match_cl_ord_id() {
        let rule = match_cl_ord_id("REQ-1");
        let hit = Message::new(MsgType::ExecutionReport).with_field(tags::CL_ORD_ID, "REQ-1");
        let miss = Message::new(MsgType::ExecutionReport).with_field(tags::CL_ORD_ID, "REQ-2");

        assert!(rule.matches(&hit));
        assert!(!rule.matches(&miss));
        assert!(!rule.matches(&Message::new(MsgType::ExecutionReport)));
    }

    #[test]
    fn test_reference_rule_by_id_field() {
        let rule = ReferenceRuleFactory::new().rule_for(&new_order("ORD-7", 12));

        let report = Message::new(MsgType::ExecutionReport).with_field(tags::CL_ORD_ID, "ORD-7");
        let other = Message::new(MsgType::ExecutionReport).with_field(tags::CL_ORD_ID, "ORD-8");
        assert!(rule.matches(&report));
        assert!(!rule.matches(&other));
    }

    #[test]
    fn test_reference_rule_by_business_reject_ref_id() {
        let rule = ReferenceRuleFactory::new().rule_for(&new_order("ORD-7", 12));
        let reject = Message::new(MsgType::BusinessMessageReject)
            .with_field(tags::BUSINESS_REJECT_REF_ID, "ORD-7");
        assert!(rule.matches(&reject));
    }

    #[test]
    fn test_reference_rule_by_ref_seq_num() {
        let rule = ReferenceRuleFactory::new().rule_for(&new_order("ORD-7", 12));

        let reject = Message::new(MsgType::Reject).with_field(tags::REF_SEQ_NUM, "12");
        let unrelated = Message::new(MsgType::Reject).with_field(tags::REF_SEQ_NUM, "13");
        assert!(rule.matches(&reject));
        assert!(!rule.matches(&unrelated));
    }

    #[test]
    fn test_sequence_bound_after_send() {
        let unsent = Message::new(MsgType::NewOrderSingle).with_field(tags::CL_ORD_ID, "ORD-9");
        let rule = ReferenceRuleFactory::new().rule_for(&unsent);
        let reject = Message::new(MsgType::Reject).with_field(tags::REF_SEQ_NUM, "21");

        let early = Message::new(MsgType::ExecutionReport).with_field(tags::CL_ORD_ID, "ORD-9");
        assert!(rule.matches(&early));
        assert!(!rule.matches(&reject));

        rule.on_sent(&new_order("ORD-9", 21));
        assert!(rule.matches(&reject));

        rule.on_sent(&new_order("ORD-9", 22));
        assert!(rule.matches(&reject));
    }

    #[test]
    fn test_market_data_request_mapping() {
        let request = Message::new(MsgType::MarketDataRequest).with_field(tags::MD_REQ_ID, "MD-1");
        let rule = ReferenceRuleFactory::new().rule_for(&request);

        let snapshot =
            Message::new(MsgType::MarketDataSnapshotFullRefresh).with_field(tags::MD_REQ_ID, "MD-1");
        let stray = Message::new(MsgType::MarketDataSnapshotFullRefresh)
            .with_field(tags::CL_ORD_ID, "MD-1");
        assert!(rule.matches(&snapshot));
        assert!(!rule.matches(&stray));
    }

    #[test]
    fn test_unmapped_request_only_matches_by_sequence() {
        let request = Message::new(MsgType::Custom("U1".to_string()))
            .with_field(tags::CL_ORD_ID, "X")
            .with_field(tags::MSG_SEQ_NUM, "3");
        let rule = ReferenceRuleFactory::new().reference_rule(&request);

        assert_eq!(rule.request_id(), None);
        assert_eq!(rule.request_seq(), Some(SeqNum::new(3)));
        let echo = Message::new(MsgType::ExecutionReport).with_field(tags::CL_ORD_ID, "X");
        assert!(!rule.matches(&echo));
    }

    #[test]
    fn test_secondary_comparison_defaults_to_false() {
        let request = Message::new(MsgType::NewOrderSingle).with_field(tags::CL_ORD_ID, "A");
        let response = Message::new(MsgType::ExecutionReport).with_field(tags::ORIG_CL_ORD_ID, "A");

        let plain = ReferenceRuleFactory::new().rule_for(&request);
        assert!(!plain.matches(&response));

        let custom = ReferenceRuleFactory::new()
            .with_secondary(|req, resp| {
                req.get_field_str(tags::CL_ORD_ID).is_some()
                    && req.get_field_str(tags::CL_ORD_ID) == resp.get_field_str(tags::ORIG_CL_ORD_ID)
            })
            .rule_for(&request);
        assert!(custom.matches(&response));
    }

    #[test]
    fn test_with_mapping_multiple_reference_fields() {
        let factory = ReferenceRuleFactory::new().with_mapping(
            MsgType::NewOrderSingle,
            ReferenceMapping::new(tags::CL_ORD_ID, &[tags::CL_ORD_ID, tags::ORIG_CL_ORD_ID]),
        );
        let rule = factory.rule_for(&new_order("LEG-1", 40));

        let leg = Message::new(MsgType::ExecutionReport).with_field(tags::ORIG_CL_ORD_ID, "LEG-1");
        assert!(rule.matches(&leg));
        assert_eq!(
            factory.mapping(&MsgType::NewOrderSingle).map(|m| m.reference_tags.len()),
            Some(2)
        );
    }

    #[test]
    fn test_closure_factory() {
        let factory = |request: &Message| -> SharedRule {
            match_field(tags::QUOTE_REQ_ID, request.get_field_str(tags::QUOTE_REQ_ID).unwrap_or(""))
        };
        let request = Message::new(MsgType::QuoteRequest).with_field(tags::QUOTE_REQ_ID, "Q1");
        let rule = factory.rule_for(&request);
        assert!(rule.matches(&Message::new(MsgType::Quote).with_field(tags::QUOTE_REQ_ID, "Q1")));
    }
}
