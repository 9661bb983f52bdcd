//! In-memory port implementations and fixtures for handler tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, OnceLock};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::foundation::{
    DomainError, ErrorCode, NotificationId, PaymentId, PlanId, Timestamp, UserId,
};
use crate::domain::membership::{MembershipPlan, MembershipRenewalRecord, UserMembership};
use crate::domain::payment::signature::build_canonical_string;
use crate::domain::payment::{
    GatewayError, GatewayNotification, OrderStatus, PaidFields, PaymentOrder, PaymentRefund,
    RsaSigner, RsaVerifier, TradeStatus,
};
use crate::ports::{
    CasOutcome, MembershipStore, NotificationRepository, OrderRepository, PagePayRequest,
    PaymentGateway, PlanCatalog, RefundCommand, RefundOutcome, RefundRepository, TradeState,
};

// ══════════════════════════════════════════════════════════════
// Fixtures
// ══════════════════════════════════════════════════════════════

pub fn pending_order(amount_cents: i64, plan_id: Option<PlanId>) -> PaymentOrder {
    PaymentOrder::new(
        UserId::new(),
        amount_cents,
        "Annual Plan",
        plan_id,
        "FAST_INSTANT_TRADE_PAY",
    )
    .expect("valid fixture order")
}

pub fn stale_pending_order(amount_cents: i64, minutes_old: i64) -> PaymentOrder {
    let mut order = pending_order(amount_cents, None);
    order.created_at = Timestamp::now().minus_minutes(minutes_old);
    order
}

pub fn paid_fields_fixture() -> PaidFields {
    PaidFields {
        trade_no: "2024060122001".to_string(),
        trade_status: "TRADE_SUCCESS".to_string(),
        buyer_id: Some("208812".to_string()),
        buyer_logon_id: Some("buy**@example.com".to_string()),
        receipt_amount_cents: Some(8800),
        pay_time: Some(Timestamp::now()),
    }
}

pub fn paid_state(amount_cents: i64) -> TradeState {
    TradeState {
        trade_status: TradeStatus::Success,
        trade_no: Some("2024060122001".to_string()),
        buyer_id: Some("208812".to_string()),
        buyer_logon_id: None,
        receipt_amount_cents: Some(amount_cents),
        pay_time: Some(Timestamp::now()),
    }
}

pub fn plan_fixture(days: u32, level: u8, price_cents: i64) -> MembershipPlan {
    MembershipPlan {
        id: PlanId::new(),
        name: format!("{}-day plan", days),
        days,
        level,
        price_cents,
    }
}

// ══════════════════════════════════════════════════════════════
// Webhook Signing
// ══════════════════════════════════════════════════════════════

pub struct TestKeys {
    pub signer: RsaSigner,
    pub verifier: RsaVerifier,
}

/// One RSA key pair per test process; generation is expensive.
pub fn test_keys() -> &'static TestKeys {
    static KEYS: OnceLock<TestKeys> = OnceLock::new();
    KEYS.get_or_init(|| {
        use rsa::pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};
        let mut rng = rand::thread_rng();
        let private = rsa::RsaPrivateKey::new(&mut rng, 2048).expect("keygen");
        let public = rsa::RsaPublicKey::from(&private);
        let private_pem = private.to_pkcs8_pem(LineEnding::LF).expect("pkcs8 pem");
        let public_pem = public.to_public_key_pem(LineEnding::LF).expect("spki pem");
        TestKeys {
            signer: RsaSigner::from_pem(&private_pem).expect("signer"),
            verifier: RsaVerifier::from_pem(&public_pem).expect("verifier"),
        }
    })
}

/// Builds a form-encoded webhook body signed with the test key.
pub fn signed_webhook_body(fields: &[(&str, &str)]) -> String {
    let mut pairs: Vec<(String, String)> = fields
        .iter()
        .map(|(key, value)| (key.to_string(), urlencoding::encode(value).into_owned()))
        .collect();
    pairs.push(("notify_id".to_string(), "n-test".to_string()));
    pairs.push(("notify_type".to_string(), "trade_status_sync".to_string()));
    pairs.push(("sign_type".to_string(), "RSA2".to_string()));

    let canonical = build_canonical_string(&pairs);
    let sign = test_keys().signer.sign(&canonical).expect("sign fixture");
    pairs.push(("sign".to_string(), urlencoding::encode(&sign).into_owned()));

    pairs
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join("&")
}

// ══════════════════════════════════════════════════════════════
// In-Memory Orders
// ══════════════════════════════════════════════════════════════

pub struct InMemoryOrders {
    rows: RwLock<Vec<PaymentOrder>>,
}

impl InMemoryOrders {
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(Vec::new()),
        }
    }

    pub async fn insert(&self, order: &PaymentOrder) -> Result<(), DomainError> {
        let mut rows = self.rows.write().await;
        if rows.iter().any(|row| row.out_trade_no == order.out_trade_no) {
            return Err(DomainError::duplicate("out_trade_no already exists"));
        }
        rows.push(order.clone());
        Ok(())
    }

    pub async fn update(&self, order: &PaymentOrder) -> Result<(), DomainError> {
        let mut rows = self.rows.write().await;
        match rows.iter_mut().find(|row| row.id == order.id) {
            Some(row) => {
                *row = order.clone();
                Ok(())
            }
            None => Err(DomainError::new(
                ErrorCode::OrderNotFound,
                order.id.to_string(),
            )),
        }
    }

    pub async fn get(&self, id: &PaymentId) -> Option<PaymentOrder> {
        self.rows
            .read()
            .await
            .iter()
            .find(|row| row.id == *id)
            .cloned()
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrders {
    async fn insert(&self, order: &PaymentOrder) -> Result<(), DomainError> {
        InMemoryOrders::insert(self, order).await
    }

    async fn update(&self, order: &PaymentOrder) -> Result<(), DomainError> {
        InMemoryOrders::update(self, order).await
    }

    async fn find_by_id(&self, id: &PaymentId) -> Result<Option<PaymentOrder>, DomainError> {
        Ok(self.get(id).await)
    }

    async fn find_by_out_trade_no(
        &self,
        out_trade_no: &str,
    ) -> Result<Option<PaymentOrder>, DomainError> {
        Ok(self
            .rows
            .read()
            .await
            .iter()
            .find(|row| row.out_trade_no == out_trade_no)
            .cloned())
    }

    async fn count_pending_for_user(&self, user_id: &UserId) -> Result<u64, DomainError> {
        Ok(self
            .rows
            .read()
            .await
            .iter()
            .filter(|row| {
                row.user_id == *user_id
                    && row.status == OrderStatus::Pending
                    && !row.is_deleted()
            })
            .count() as u64)
    }

    async fn mark_paid_if_pending(
        &self,
        out_trade_no: &str,
        fields: &PaidFields,
    ) -> Result<CasOutcome, DomainError> {
        let mut rows = self.rows.write().await;
        match rows
            .iter_mut()
            .find(|row| row.out_trade_no == out_trade_no && row.status == OrderStatus::Pending)
        {
            Some(row) => {
                row.mark_paid(fields.clone())
                    .map_err(|e| DomainError::new(ErrorCode::InternalError, e.to_string()))?;
                Ok(CasOutcome::Applied)
            }
            None => Ok(CasOutcome::NotApplied),
        }
    }

    async fn update_status_if_pending(
        &self,
        out_trade_no: &str,
        status: OrderStatus,
    ) -> Result<CasOutcome, DomainError> {
        let mut rows = self.rows.write().await;
        match rows
            .iter_mut()
            .find(|row| row.out_trade_no == out_trade_no && row.status == OrderStatus::Pending)
        {
            Some(row) => {
                row.status = status;
                row.updated_at = Timestamp::now();
                Ok(CasOutcome::Applied)
            }
            None => Ok(CasOutcome::NotApplied),
        }
    }

    async fn find_stale_pending(
        &self,
        cutoff: Timestamp,
        limit: u32,
    ) -> Result<Vec<PaymentOrder>, DomainError> {
        let rows = self.rows.read().await;
        let mut stale: Vec<PaymentOrder> = rows
            .iter()
            .filter(|row| !row.is_deleted() && row.is_stale_pending(cutoff))
            .cloned()
            .collect();
        stale.sort_by_key(|row| row.created_at);
        stale.truncate(limit as usize);
        Ok(stale)
    }
}

// ══════════════════════════════════════════════════════════════
// In-Memory Refunds
// ══════════════════════════════════════════════════════════════

pub struct InMemoryRefunds {
    rows: RwLock<Vec<PaymentRefund>>,
}

impl InMemoryRefunds {
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(Vec::new()),
        }
    }

    pub async fn get_by_request_no(&self, out_request_no: &str) -> Option<PaymentRefund> {
        self.rows
            .read()
            .await
            .iter()
            .find(|row| row.out_request_no == out_request_no)
            .cloned()
    }
}

#[async_trait]
impl RefundRepository for InMemoryRefunds {
    async fn insert(&self, refund: &PaymentRefund) -> Result<(), DomainError> {
        let mut rows = self.rows.write().await;
        if rows
            .iter()
            .any(|row| row.out_request_no == refund.out_request_no)
        {
            return Err(DomainError::duplicate("out_request_no already exists"));
        }
        rows.push(refund.clone());
        Ok(())
    }

    async fn update(&self, refund: &PaymentRefund) -> Result<(), DomainError> {
        let mut rows = self.rows.write().await;
        match rows.iter_mut().find(|row| row.id == refund.id) {
            Some(row) => {
                *row = refund.clone();
                Ok(())
            }
            None => Err(DomainError::new(
                ErrorCode::RefundNotFound,
                refund.id.to_string(),
            )),
        }
    }

    async fn find_by_out_request_no(
        &self,
        out_request_no: &str,
    ) -> Result<Option<PaymentRefund>, DomainError> {
        Ok(self.get_by_request_no(out_request_no).await)
    }

    async fn find_by_order(&self, order_id: &PaymentId) -> Result<Vec<PaymentRefund>, DomainError> {
        Ok(self
            .rows
            .read()
            .await
            .iter()
            .filter(|row| row.order_id == *order_id)
            .cloned()
            .collect())
    }
}

// ══════════════════════════════════════════════════════════════
// In-Memory Notifications
// ══════════════════════════════════════════════════════════════

pub struct InMemoryNotifications {
    rows: RwLock<Vec<GatewayNotification>>,
}

impl InMemoryNotifications {
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(Vec::new()),
        }
    }

    pub async fn get(&self, id: &NotificationId) -> Option<GatewayNotification> {
        self.rows
            .read()
            .await
            .iter()
            .find(|row| row.id == *id)
            .cloned()
    }

    pub async fn all(&self) -> Vec<GatewayNotification> {
        self.rows.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }
}

#[async_trait]
impl NotificationRepository for InMemoryNotifications {
    async fn insert(&self, notification: &GatewayNotification) -> Result<(), DomainError> {
        self.rows.write().await.push(notification.clone());
        Ok(())
    }

    async fn update(&self, notification: &GatewayNotification) -> Result<(), DomainError> {
        let mut rows = self.rows.write().await;
        match rows.iter_mut().find(|row| row.id == notification.id) {
            Some(row) => {
                *row = notification.clone();
                Ok(())
            }
            None => Err(DomainError::new(
                ErrorCode::NotificationNotFound,
                notification.id.to_string(),
            )),
        }
    }

    async fn find_by_id(
        &self,
        id: &NotificationId,
    ) -> Result<Option<GatewayNotification>, DomainError> {
        Ok(self.get(id).await)
    }

    async fn find_by_order(
        &self,
        order_id: &PaymentId,
    ) -> Result<Vec<GatewayNotification>, DomainError> {
        Ok(self
            .rows
            .read()
            .await
            .iter()
            .filter(|row| row.order_id == Some(*order_id))
            .cloned()
            .collect())
    }
}

// ══════════════════════════════════════════════════════════════
// In-Memory Memberships
// ══════════════════════════════════════════════════════════════

pub struct InMemoryMemberships {
    memberships: RwLock<HashMap<UserId, UserMembership>>,
    records: RwLock<Vec<MembershipRenewalRecord>>,
}

impl InMemoryMemberships {
    pub fn new() -> Self {
        Self {
            memberships: RwLock::new(HashMap::new()),
            records: RwLock::new(Vec::new()),
        }
    }

    pub async fn find(&self, user_id: &UserId) -> Option<UserMembership> {
        self.memberships.read().await.get(user_id).cloned()
    }

    pub async fn record_count(&self) -> usize {
        self.records.read().await.len()
    }
}

#[async_trait]
impl MembershipStore for InMemoryMemberships {
    async fn find_by_user(&self, user_id: &UserId) -> Result<Option<UserMembership>, DomainError> {
        Ok(self.find(user_id).await)
    }

    async fn save_activation(
        &self,
        membership: &UserMembership,
        record: &MembershipRenewalRecord,
    ) -> Result<(), DomainError> {
        let mut memberships = self.memberships.write().await;
        let mut records = self.records.write().await;
        memberships.insert(membership.user_id, membership.clone());
        records.push(record.clone());
        Ok(())
    }
}

// ══════════════════════════════════════════════════════════════
// Static Plan Catalog
// ══════════════════════════════════════════════════════════════

pub struct StaticCatalog {
    plans: Vec<MembershipPlan>,
}

impl StaticCatalog {
    pub fn new(plans: Vec<MembershipPlan>) -> Self {
        Self { plans }
    }
}

#[async_trait]
impl PlanCatalog for StaticCatalog {
    async fn find_plan(&self, id: &PlanId) -> Result<Option<MembershipPlan>, DomainError> {
        Ok(self.plans.iter().find(|plan| plan.id == *id).cloned())
    }
}

// ══════════════════════════════════════════════════════════════
// Stub Gateway
// ══════════════════════════════════════════════════════════════

pub struct StubGateway {
    query_result: Mutex<Option<Result<TradeState, GatewayError>>>,
    fail_next: Mutex<Option<GatewayError>>,
    fail_pay_url: Mutex<bool>,
    pay_url_count: AtomicU32,
    query_count: AtomicU32,
    close_count: AtomicU32,
    cancel_count: AtomicU32,
    refund_count: AtomicU32,
}

impl StubGateway {
    pub fn new() -> Self {
        Self {
            query_result: Mutex::new(None),
            fail_next: Mutex::new(None),
            fail_pay_url: Mutex::new(false),
            pay_url_count: AtomicU32::new(0),
            query_count: AtomicU32::new(0),
            close_count: AtomicU32::new(0),
            cancel_count: AtomicU32::new(0),
            refund_count: AtomicU32::new(0),
        }
    }

    /// Answer every trade query with this result.
    pub fn set_query_result(&self, result: Result<TradeState, GatewayError>) {
        *self.query_result.lock().expect("stub lock") = Some(result);
    }

    /// Fail the next close/cancel/refund call with a generic API error.
    pub fn fail_next_call(&self) {
        *self.fail_next.lock().expect("stub lock") =
            Some(GatewayError::api("40004", "Business Failed"));
    }

    pub fn fail_next_call_with_trade_not_exist(&self) {
        *self.fail_next.lock().expect("stub lock") = Some(
            GatewayError::api("40004", "Business Failed").with_sub_code("ACQ.TRADE_NOT_EXIST"),
        );
    }

    pub fn fail_pay_url(&self) {
        *self.fail_pay_url.lock().expect("stub lock") = true;
    }

    pub fn query_calls(&self) -> u32 {
        self.query_count.load(Ordering::SeqCst)
    }

    pub fn close_calls(&self) -> u32 {
        self.close_count.load(Ordering::SeqCst)
    }

    pub fn cancel_calls(&self) -> u32 {
        self.cancel_count.load(Ordering::SeqCst)
    }

    pub fn refund_calls(&self) -> u32 {
        self.refund_count.load(Ordering::SeqCst)
    }

    fn take_failure(&self) -> Option<GatewayError> {
        self.fail_next.lock().expect("stub lock").take()
    }
}

#[async_trait]
impl PaymentGateway for StubGateway {
    fn build_pay_url(&self, request: &PagePayRequest) -> Result<String, GatewayError> {
        self.pay_url_count.fetch_add(1, Ordering::SeqCst);
        if *self.fail_pay_url.lock().expect("stub lock") {
            return Err(GatewayError::api("40002", "Invalid Arguments"));
        }
        Ok(format!(
            "https://gateway.example.com/api?method=trade.page.pay&out_trade_no={}",
            request.out_trade_no
        ))
    }

    async fn query_trade(&self, _out_trade_no: &str) -> Result<TradeState, GatewayError> {
        self.query_count.fetch_add(1, Ordering::SeqCst);
        match self.query_result.lock().expect("stub lock").as_ref() {
            Some(result) => result.clone(),
            None => Ok(TradeState {
                trade_status: TradeStatus::WaitBuyerPay,
                trade_no: None,
                buyer_id: None,
                buyer_logon_id: None,
                receipt_amount_cents: None,
                pay_time: None,
            }),
        }
    }

    async fn close_trade(&self, _out_trade_no: &str) -> Result<(), GatewayError> {
        self.close_count.fetch_add(1, Ordering::SeqCst);
        match self.take_failure() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn cancel_trade(&self, _out_trade_no: &str) -> Result<(), GatewayError> {
        self.cancel_count.fetch_add(1, Ordering::SeqCst);
        match self.take_failure() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn refund_trade(&self, command: &RefundCommand) -> Result<RefundOutcome, GatewayError> {
        self.refund_count.fetch_add(1, Ordering::SeqCst);
        match self.take_failure() {
            Some(error) => Err(error),
            None => Ok(RefundOutcome {
                refund_fee_cents: Some(command.refund_amount_cents),
                refund_status: Some("REFUND_SUCCESS".to_string()),
            }),
        }
    }
}
