//! In-memory session state and the transitions user actions drive through it.

use serde::Serialize;
use tracing::{debug, info};

use crate::classification::ClassificationResult;
use crate::constants::{CLAIM_REWARD, STARTING_POINTS};
use crate::conversation::{Conversation, ConversationTurn, Role};
use crate::error::{ServiceError, UserActionError};
use crate::rewards::RewardItem;

pub const SCAN_FAILED_MESSAGE: &str = "Gagal menganalisis gambar. Pastikan gambar jelas dan coba lagi.";
pub const INSUFFICIENT_POINTS_MESSAGE: &str = "Poin tidak cukup!";
pub const UNAVAILABLE_MESSAGE: &str = "Hadiah ini sedang tidak tersedia.";

/// Redeemable points. Cannot go below zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PointBalance(u32);

impl PointBalance {
    pub fn new(points: u32) -> Self {
        Self(points)
    }

    pub fn value(self) -> u32 {
        self.0
    }

    pub fn credit(&mut self, amount: u32) {
        self.0 = self.0.saturating_add(amount);
    }

    pub fn try_debit(&mut self, cost: u32) -> Result<(), UserActionError> {
        if self.0 < cost {
            return Err(UserActionError::InsufficientPoints { cost, balance: self.0 });
        }
        self.0 -= cost;
        Ok(())
    }
}

impl Default for PointBalance {
    fn default() -> Self {
        Self(STARTING_POINTS)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScanState {
    Idle,
    /// `image` is the data URL the browser previews while waiting.
    Scanning { image: String },
    Resolved { image: String, result: ClassificationResult },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub id: u64,
    pub message: String,
}

/// Everything the front-end needs to draw the current screen.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub points: u32,
    pub scan_status: &'static str,
    /// Where the preview of the current photo can be fetched. Changes with every scan.
    pub image_url: Option<String>,
    pub result: Option<ClassificationResult>,
    pub error: Option<String>,
    pub notification: Option<Notification>,
    pub messages: Vec<ConversationTurn>,
    pub chat_pending: bool,
}

#[derive(Debug, Clone)]
pub struct Session {
    scan: ScanState,
    points: PointBalance,
    error: Option<String>,
    notification: Option<Notification>,
    next_notification_id: u64,
    scan_seq: u64,
    conversation: Conversation,
    chat_pending: bool,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self::with_points(STARTING_POINTS)
    }

    pub fn with_points(points: u32) -> Self {
        Self {
            scan: ScanState::Idle,
            points: PointBalance::new(points),
            error: None,
            notification: None,
            next_notification_id: 0,
            scan_seq: 0,
            conversation: Conversation::new(),
            chat_pending: false,
        }
    }

    pub fn points(&self) -> u32 {
        self.points.value()
    }

    pub fn scan_state(&self) -> &ScanState {
        &self.scan
    }

    pub fn result(&self) -> Option<&ClassificationResult> {
        match &self.scan {
            ScanState::Resolved { result, .. } => Some(result),
            _ => None,
        }
    }

    /// Data URL of the photo being scanned or shown with its result.
    pub fn scan_image(&self) -> Option<&str> {
        match &self.scan {
            ScanState::Idle => None,
            ScanState::Scanning { image } | ScanState::Resolved { image, .. } => Some(image),
        }
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn notification(&self) -> Option<&Notification> {
        self.notification.as_ref()
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn is_chat_pending(&self) -> bool {
        self.chat_pending
    }

    /// A new image was picked. Any previous result or banner is dropped.
    pub fn start_scan(&mut self, image: String) -> Result<(), UserActionError> {
        if matches!(self.scan, ScanState::Scanning { .. }) {
            return Err(UserActionError::ScanInProgress);
        }
        self.error = None;
        self.scan_seq += 1;
        self.scan = ScanState::Scanning { image };
        debug!("Scan started");
        Ok(())
    }

    /// Apply the outcome of the classification call started by `start_scan`.
    pub fn finish_scan(
        &mut self,
        outcome: Result<ClassificationResult, ServiceError>,
    ) -> Result<(), UserActionError> {
        let image = match std::mem::replace(&mut self.scan, ScanState::Idle) {
            ScanState::Scanning { image } => image,
            other => {
                self.scan = other;
                return Err(UserActionError::NotScanning);
            }
        };

        match outcome {
            Ok(result) => {
                info!(item = %result.item_name, "Scan resolved");
                self.scan = ScanState::Resolved { image, result };
            }
            Err(e) => {
                info!(error = %e, "Scan failed");
                self.error = Some(SCAN_FAILED_MESSAGE.to_string());
            }
        }
        Ok(())
    }

    /// Credit the scan reward. Only does anything while a result is showing.
    pub fn claim_points(&mut self) -> Option<u32> {
        if !matches!(self.scan, ScanState::Resolved { .. }) {
            return None;
        }
        self.points.credit(CLAIM_REWARD);
        self.scan = ScanState::Idle;
        self.error = None;
        self.notify(format!("Berhasil! +{} Poin ditambahkan.", CLAIM_REWARD));
        info!(balance = self.points(), "Points claimed");
        Some(CLAIM_REWARD)
    }

    /// Trade points for `item`. Allowed in any scan state.
    pub fn redeem(&mut self, item: &RewardItem) -> Result<u32, UserActionError> {
        if !item.is_available {
            self.error = Some(UNAVAILABLE_MESSAGE.to_string());
            return Err(UserActionError::RewardUnavailable(item.name.to_string()));
        }
        if let Err(e) = self.points.try_debit(item.cost_in_points) {
            self.error = Some(INSUFFICIENT_POINTS_MESSAGE.to_string());
            return Err(e);
        }
        self.notify(format!("Berhasil menukar: {}", item.name));
        info!(reward = item.name, balance = self.points(), "Reward redeemed");
        Ok(self.points())
    }

    pub fn dismiss_error(&mut self) {
        self.error = None;
    }

    /// Clear notification `id` unless a newer one has replaced it.
    pub fn expire_notification(&mut self, id: u64) -> bool {
        if self.notification.as_ref().map(|n| n.id) == Some(id) {
            self.notification = None;
            return true;
        }
        false
    }

    /// Record the user's message and hand back the turns that preceded it.
    pub fn begin_chat(&mut self, text: &str) -> Result<Vec<ConversationTurn>, UserActionError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(UserActionError::EmptyMessage);
        }
        if self.chat_pending {
            return Err(UserActionError::ChatPending);
        }
        let prior = self.conversation.turns().to_vec();
        self.conversation.push(Role::User, text);
        self.chat_pending = true;
        Ok(prior)
    }

    pub fn finish_chat(&mut self, reply: String) -> &ConversationTurn {
        self.chat_pending = false;
        self.conversation.push(Role::Assistant, reply)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let (scan_status, result) = match &self.scan {
            ScanState::Idle => ("idle", None),
            ScanState::Scanning { .. } => ("scanning", None),
            ScanState::Resolved { result, .. } => ("resolved", Some(result.clone())),
        };
        let image_url = self
            .scan_image()
            .map(|_| format!("/api/scan/image?v={}", self.scan_seq));
        SessionSnapshot {
            points: self.points(),
            scan_status,
            image_url,
            result,
            error: self.error.clone(),
            notification: self.notification.clone(),
            messages: self.conversation.turns().to_vec(),
            chat_pending: self.chat_pending,
        }
    }

    fn notify(&mut self, message: String) {
        self.next_notification_id += 1;
        self.notification = Some(Notification {
            id: self.next_notification_id,
            message,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classification::{RecyclingPotential, WasteCategory};
    use crate::rewards;

    fn sample_result() -> ClassificationResult {
        ClassificationResult {
            item_name: "Botol plastik".to_string(),
            category: WasteCategory::Inorganic,
            confidence: Some(0.9),
            explanation: "PET".to_string(),
            disposal_advice: vec!["Bilas".to_string()],
            recycling_potential: RecyclingPotential::High,
        }
    }

    fn item(cost: u32) -> RewardItem {
        RewardItem {
            id: 42,
            name: "Test",
            vendor_name: "Warung",
            cost_in_points: cost,
            glyph: "🎁",
            is_available: true,
        }
    }

    fn resolved_session() -> Session {
        let mut session = Session::new();
        session.start_scan("data:image/jpeg;base64,AAAA".to_string()).unwrap();
        session.finish_scan(Ok(sample_result())).unwrap();
        session
    }

    #[test]
    fn test_starts_idle_with_hundred_points() {
        let session = Session::new();
        assert_eq!(session.points(), 100);
        assert_eq!(session.scan_state(), &ScanState::Idle);
        assert_eq!(session.conversation().len(), 1);
    }

    #[test]
    fn test_scan_claim_cycle_adds_ten_and_resets() {
        let mut session = resolved_session();
        assert!(session.result().is_some());

        assert_eq!(session.claim_points(), Some(10));
        assert_eq!(session.points(), 110);
        assert_eq!(session.scan_state(), &ScanState::Idle);
        assert!(session.result().is_none());
        assert!(session.notification().unwrap().message.contains("+10"));
    }

    #[test]
    fn test_claim_outside_resolved_has_no_effect() {
        let mut session = Session::new();
        assert_eq!(session.claim_points(), None);
        assert_eq!(session.points(), 100);

        session.start_scan("img".to_string()).unwrap();
        assert_eq!(session.claim_points(), None);
        assert_eq!(session.points(), 100);

        let mut session = resolved_session();
        session.claim_points();
        assert_eq!(session.claim_points(), None);
        assert_eq!(session.points(), 110);
    }

    #[test]
    fn test_failed_scan_sets_banner_and_returns_idle() {
        let mut session = Session::new();
        session.start_scan("img".to_string()).unwrap();
        session.finish_scan(Err(ServiceError::MissingField("category"))).unwrap();
        assert_eq!(session.scan_state(), &ScanState::Idle);
        assert_eq!(session.error(), Some(SCAN_FAILED_MESSAGE));

        // Re-scanning clears the banner.
        session.start_scan("img2".to_string()).unwrap();
        assert!(session.error().is_none());
    }

    #[test]
    fn test_second_scan_while_pending_is_rejected() {
        let mut session = Session::new();
        session.start_scan("a".to_string()).unwrap();
        assert_eq!(session.start_scan("b".to_string()), Err(UserActionError::ScanInProgress));
        assert_eq!(
            session.scan_state(),
            &ScanState::Scanning { image: "a".to_string() }
        );
    }

    #[test]
    fn test_finish_without_scan_is_rejected() {
        let mut session = resolved_session();
        assert_eq!(session.finish_scan(Ok(sample_result())), Err(UserActionError::NotScanning));
        assert!(session.result().is_some());
    }

    #[test]
    fn test_new_scan_discards_previous_result() {
        let mut session = resolved_session();
        session.start_scan("next".to_string()).unwrap();
        assert!(session.result().is_none());
    }

    #[test]
    fn test_redeem_iff_balance_covers_cost() {
        for (balance, cost) in [(0, 0), (0, 1), (49, 50), (50, 50), (51, 50), (100, 150), (250, 250)] {
            let mut session = Session::with_points(balance);
            let outcome = session.redeem(&item(cost));
            if balance >= cost {
                assert_eq!(outcome, Ok(balance - cost));
                assert_eq!(session.points(), balance - cost);
            } else {
                assert_eq!(outcome, Err(UserActionError::InsufficientPoints { cost, balance }));
                assert_eq!(session.points(), balance);
                assert_eq!(session.error(), Some(INSUFFICIENT_POINTS_MESSAGE));
            }
        }
    }

    #[test]
    fn test_redeem_scenario_from_hundred() {
        let mut session = Session::new();
        let voucher = rewards::find(4).unwrap();
        assert_eq!(voucher.cost_in_points, 150);
        assert!(session.redeem(voucher).is_err());
        assert_eq!(session.points(), 100);
        assert_eq!(session.error(), Some(INSUFFICIENT_POINTS_MESSAGE));

        let tea = rewards::find(1).unwrap();
        assert_eq!(session.redeem(tea), Ok(50));
        assert_eq!(session.points(), 50);
        assert_eq!(session.notification().unwrap().message, "Berhasil menukar: Es Teh Manis Jumbo");
    }

    #[test]
    fn test_redeem_does_not_touch_scan_state() {
        let mut session = resolved_session();
        session.redeem(&item(10)).unwrap();
        assert!(session.result().is_some());
    }

    #[test]
    fn test_unavailable_reward_is_rejected() {
        let mut session = Session::new();
        let mut sold_out = item(10);
        sold_out.is_available = false;
        assert!(matches!(session.redeem(&sold_out), Err(UserActionError::RewardUnavailable(_))));
        assert_eq!(session.points(), 100);
    }

    #[test]
    fn test_expire_only_current_notification() {
        let mut session = Session::new();
        session.redeem(&item(1)).unwrap();
        let first = session.notification().unwrap().id;
        session.redeem(&item(1)).unwrap();
        let second = session.notification().unwrap().id;

        assert!(!session.expire_notification(first));
        assert!(session.notification().is_some());
        assert!(session.expire_notification(second));
        assert!(session.notification().is_none());
    }

    #[test]
    fn test_dismiss_error() {
        let mut session = Session::with_points(0);
        let _ = session.redeem(&item(5));
        assert!(session.error().is_some());
        session.dismiss_error();
        assert!(session.error().is_none());
    }

    #[test]
    fn test_chat_turns_are_serialized() {
        let mut session = Session::new();
        let prior = session.begin_chat("  Halo EcoBot  ").unwrap();
        assert_eq!(prior.len(), 1);
        assert!(session.is_chat_pending());
        assert_eq!(session.begin_chat("lagi"), Err(UserActionError::ChatPending));

        session.finish_chat("Halo!".to_string());
        assert!(!session.is_chat_pending());

        let turns = session.conversation().turns();
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[1].role, Role::User);
        assert_eq!(turns[1].text, "Halo EcoBot");
        assert_eq!(turns[2].role, Role::Assistant);
    }

    #[test]
    fn test_blank_chat_message_is_rejected() {
        let mut session = Session::new();
        assert_eq!(session.begin_chat("   "), Err(UserActionError::EmptyMessage));
        assert!(!session.is_chat_pending());
        assert_eq!(session.conversation().len(), 1);
    }

    #[test]
    fn test_snapshot_reflects_state() {
        let session = resolved_session();
        let snapshot = session.snapshot();
        assert_eq!(snapshot.scan_status, "resolved");
        assert_eq!(snapshot.points, 100);
        assert!(snapshot.result.is_some());

        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value["scanStatus"], "resolved");
        assert_eq!(value["result"]["category"], "Anorganik");
        assert_eq!(value["chatPending"], false);
        assert!(value.get("image").is_none());
    }

    #[test]
    fn test_snapshot_links_image_instead_of_embedding_it() {
        let mut session = resolved_session();
        assert_eq!(session.scan_image(), Some("data:image/jpeg;base64,AAAA"));
        let first = session.snapshot().image_url.unwrap();

        session.start_scan("data:image/png;base64,BBBB".to_string()).unwrap();
        let second = session.snapshot().image_url.unwrap();
        assert_ne!(first, second);
        assert!(!second.contains("BBBB"));

        session.finish_scan(Err(ServiceError::EmptyResponse)).unwrap();
        assert!(session.scan_image().is_none());
        assert!(session.snapshot().image_url.is_none());
    }
}
