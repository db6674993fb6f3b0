//! Segment keys and their outreach templates.
//!
//! The template table is static and immutable: classification only ever
//! picks a key, the content behind a key never changes at runtime.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentKey {
    Vip,
    Loyal,
    Regular,
    AtRisk,
    New,
    LowValue,
}

impl SegmentKey {
    pub const ALL: [SegmentKey; 6] = [
        Self::Vip,
        Self::Loyal,
        Self::Regular,
        Self::AtRisk,
        Self::New,
        Self::LowValue,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Vip => "vip",
            Self::Loyal => "loyal",
            Self::Regular => "regular",
            Self::AtRisk => "at_risk",
            Self::New => "new",
            Self::LowValue => "low_value",
        }
    }

    pub fn template(&self) -> &'static SegmentTemplate {
        match self {
            Self::Vip => &VIP,
            Self::Loyal => &LOYAL,
            Self::Regular => &REGULAR,
            Self::AtRisk => &AT_RISK,
            Self::New => &NEW,
            Self::LowValue => &LOW_VALUE,
        }
    }
}

/// Outreach priority. Declaration order is rank order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Priority {
    High,
    MediumHigh,
    Medium,
    Low,
}

impl Priority {
    /// 0 for high through 3 for low.
    pub fn rank(&self) -> u8 {
        *self as u8
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::MediumHigh => "medium-high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct SegmentTemplate {
    pub display_name: &'static str,
    pub actions: &'static [&'static str],
    /// `[Customer Name]` is the placeholder for the recipient.
    pub message_template: &'static str,
    pub priority: Priority,
}

static VIP: SegmentTemplate = SegmentTemplate {
    display_name: "VIP / Champions",
    actions: &[
        "Offer a VIP loyalty programme with exclusive benefits",
        "Send personalised thank-you notes and birthday gifts",
        "Invite to product launch events before the public release",
        "Assign a dedicated account manager",
    ],
    message_template: "Dear [Customer Name], thank you for staying with us. As a VIP customer you are entitled to [benefit]...",
    priority: Priority::High,
};

static LOYAL: SegmentTemplate = SegmentTemplate {
    display_name: "Loyal Customers",
    actions: &[
        "Recommend complementary products (cross-sell) based on purchase history",
        "Email premium alternatives (upsell)",
        "Award bonus points for referring friends",
        "Provide a discount voucher for the next purchase",
    ],
    message_template: "Hi [Customer Name], we picked a few products that match your interests...",
    priority: Priority::MediumHigh,
};

static REGULAR: SegmentTemplate = SegmentTemplate {
    display_name: "Regular Customers",
    actions: &[
        "Send a periodic newsletter with useful content",
        "Offer small discount codes to encourage repeat purchases",
        "Remind about abandoned carts",
        "Introduce the points programme",
    ],
    message_template: "Hello [Customer Name], don't miss this week's special offer...",
    priority: Priority::Medium,
};

static AT_RISK: SegmentTemplate = SegmentTemplate {
    display_name: "At Risk / Hibernating",
    actions: &[
        "Send a 'we miss you' email with a special offer",
        "Survey why the customer has not come back",
        "Provide an attractive reactivation voucher",
        "Call high-value customers directly",
    ],
    message_template: "Hi [Customer Name], it's been a while. Here is an offer reserved just for you...",
    priority: Priority::High,
};

static NEW: SegmentTemplate = SegmentTemplate {
    display_name: "New Customers",
    actions: &[
        "Send a welcome email with a getting-started guide",
        "Offer an incentive for the second purchase",
        "Ask for feedback after the first purchase",
        "Introduce other popular products",
    ],
    message_template: "Welcome to the family, [Customer Name]! Here is everything you need to know...",
    priority: Priority::Medium,
};

static LOW_VALUE: SegmentTemplate = SegmentTemplate {
    display_name: "Low Value / Occasional",
    actions: &[
        "Send seasonal promotion emails",
        "Promote popular low-priced products",
        "Offer free shipping above an order threshold",
        "Rely on marketing automation rather than personal outreach",
    ],
    message_template: "Hello, don't miss the biggest sale of the year...",
    priority: Priority::Low,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priorities_rank_in_declaration_order() {
        assert_eq!(Priority::High.rank(), 0);
        assert_eq!(Priority::MediumHigh.rank(), 1);
        assert_eq!(Priority::Medium.rank(), 2);
        assert_eq!(Priority::Low.rank(), 3);
        assert_eq!(
            serde_json::to_value(Priority::MediumHigh).unwrap(),
            serde_json::json!("medium-high")
        );
    }

    #[test]
    fn every_key_has_a_non_empty_template() {
        for key in SegmentKey::ALL {
            let t = key.template();
            assert!(!t.display_name.is_empty());
            assert!(!t.actions.is_empty());
            assert!(t.message_template.len() > 10);
        }
        assert_eq!(SegmentKey::AtRisk.template().priority, Priority::High);
        assert_eq!(SegmentKey::LowValue.template().priority, Priority::Low);
    }
}
