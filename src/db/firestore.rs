// SPDX-License-Identifier: MIT
// Copyright 2026 DateU

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for every collection the lifecycle
//! touches, plus the three transactional workflows that carry the
//! invariant-bearing state transitions:
//! - `confirm_match_txn` (match creation + quota decrement)
//! - `approve_payment_txn` (payment review + subscription grant + round join)
//! - `approve_claim_txn` (claim review + earnings credit under the cap)

use crate::db::{collections, ACTIVE_ROUND_DOC};
use crate::error::AppError;
use crate::models::payment::pick_active_subscription;
use crate::models::{
    ActiveRoundPointer, Assignment, ChatMessage, ClaimStatus, Like, Match, MatchingRound,
    Notification, Payment, PaymentStatus, Plan, Referral, ReferralClaim, ReferralRecord,
    Subscription, SubscriptionStatus, User,
};
use chrono::Utc;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        // Use ExternalJwtFunctionSource to provide a dummy token without needing
        // a custom TokenSource implementation struct.
        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    /// Clone of the client whose reads execute inside `transaction`.
    ///
    /// Reads through this clone register the documents they touch in the
    /// transaction's read set, so a concurrent write to any of them aborts
    /// the commit instead of silently racing it.
    fn txn_client(
        &self,
        transaction: &firestore::FirestoreTransaction<'_>,
    ) -> Result<firestore::FirestoreDb, AppError> {
        Ok(self.get_client()?.clone_with_consistency_selector(
            firestore::FirestoreConsistencySelector::Transaction(
                transaction.transaction_id().clone(),
            ),
        ))
    }

    // ─── User Operations ─────────────────────────────────────────

    /// Get a user by auth uid.
    pub async fn get_user(&self, uid: &str) -> Result<Option<User>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(uid)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create or update a user.
    pub async fn upsert_user(&self, user: &User) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::USERS)
            .document_id(&user.uid)
            .object(user)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Round Operations ────────────────────────────────────────

    pub async fn get_round(&self, round_id: &str) -> Result<Option<MatchingRound>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::ROUNDS)
            .obj()
            .one(round_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    pub async fn upsert_round(&self, round: &MatchingRound) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::ROUNDS)
            .document_id(&round.round_id)
            .object(round)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// List all rounds, newest first.
    pub async fn list_rounds(&self) -> Result<Vec<MatchingRound>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::ROUNDS)
            .order_by([(
                "created_at",
                firestore::FirestoreQueryDirection::Descending,
            )])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Read the active-round pointer document.
    pub async fn get_active_round_pointer(
        &self,
    ) -> Result<Option<ActiveRoundPointer>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::REGISTRY)
            .obj()
            .one(ACTIVE_ROUND_DOC)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Overwrite the active-round pointer document.
    ///
    /// A single-document write is atomic in Firestore, so the pointer is the
    /// whole mutual-exclusion story: there is never more than one active
    /// round because there is only one pointer.
    pub async fn set_active_round_pointer(
        &self,
        pointer: &ActiveRoundPointer,
    ) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::REGISTRY)
            .document_id(ACTIVE_ROUND_DOC)
            .object(pointer)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Union uids into a round's participant list inside a transaction.
    ///
    /// Returns the number of uids that were newly added.
    pub async fn union_round_participants(
        &self,
        round_id: &str,
        uids: &[String],
    ) -> Result<usize, AppError> {
        let mut transaction = self
            .get_client()?
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        let mut round: MatchingRound = self
            .txn_client(&transaction)?
            .fluent()
            .select()
            .by_id_in(collections::ROUNDS)
            .obj()
            .one(round_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to read round in transaction: {}", e)))?
            .ok_or_else(|| AppError::NotFound(format!("Round {} not found", round_id)))?;

        let mut added = 0;
        for uid in uids {
            if !round.participating_males.contains(uid) {
                round.participating_males.push(uid.clone());
                added += 1;
            }
        }

        if added == 0 {
            let _ = transaction.rollback().await;
            return Ok(0);
        }

        self.get_client()?
            .fluent()
            .update()
            .in_col(collections::ROUNDS)
            .document_id(&round.round_id)
            .object(&round)
            .add_to_transaction(&mut transaction)
            .map_err(|e| AppError::Database(format!("Failed to add round to transaction: {}", e)))?;

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;

        Ok(added)
    }

    // ─── Assignment Operations ───────────────────────────────────

    pub async fn get_assignment(
        &self,
        round_id: &str,
        girl_uid: &str,
    ) -> Result<Option<Assignment>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::ASSIGNMENTS)
            .obj()
            .one(Assignment::doc_id(round_id, girl_uid))
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Full overwrite of a girl's curated candidate list.
    pub async fn set_assignment(&self, assignment: &Assignment) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::ASSIGNMENTS)
            .document_id(Assignment::doc_id(&assignment.round_id, &assignment.girl_uid))
            .object(assignment)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Like Operations ─────────────────────────────────────────

    pub async fn get_like(
        &self,
        round_id: &str,
        liking_uid: &str,
        liked_uid: &str,
    ) -> Result<Option<Like>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::LIKES)
            .obj()
            .one(Like::doc_id(round_id, liking_uid, liked_uid))
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    pub async fn upsert_like(&self, like: &Like) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::LIKES)
            .document_id(Like::doc_id(
                &like.round_id,
                &like.liking_user_uid,
                &like.liked_user_uid,
            ))
            .object(like)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Likes received by a boy within a round, newest first.
    pub async fn likes_for_boy(
        &self,
        round_id: &str,
        boy_uid: &str,
    ) -> Result<Vec<Like>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::LIKES)
            .filter(|q| {
                q.for_all([
                    q.field("round_id").eq(round_id),
                    q.field("liked_user_uid").eq(boy_uid),
                ])
            })
            .order_by([(
                "created_at",
                firestore::FirestoreQueryDirection::Descending,
            )])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    // ─── Match Operations ────────────────────────────────────────

    /// Get a match by its composite document ID.
    pub async fn get_match_by_doc_id(&self, match_id: &str) -> Result<Option<Match>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::MATCHES)
            .obj()
            .one(match_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// All matches where the user is the boy or the girl, newest first.
    ///
    /// A user's gender is fixed, so the two queries never overlap.
    pub async fn matches_for_user(&self, uid: &str) -> Result<Vec<Match>, AppError> {
        let as_boy: Vec<Match> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::MATCHES)
            .filter(|q| q.for_all([q.field("boy_uid").eq(uid)]))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let as_girl: Vec<Match> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::MATCHES)
            .filter(|q| q.for_all([q.field("girl_uid").eq(uid)]))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let mut matches = as_boy;
        matches.extend(as_girl);
        matches.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matches)
    }

    /// Matches where the user is the boy (quota consumption count for repair).
    pub async fn matches_for_boy(&self, boy_uid: &str) -> Result<Vec<Match>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::MATCHES)
            .filter(|q| q.for_all([q.field("boy_uid").eq(boy_uid)]))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Atomically create a match and decrement the boy's quota.
    ///
    /// Returns the match and whether it was newly created. An existing match
    /// document short-circuits with `newly_created = false` and no quota
    /// charge, so retries and girl-side/boy-side races converge on one match
    /// and at most one decrement.
    pub async fn confirm_match_txn(
        &self,
        round_id: &str,
        boy_uid: &str,
        girl_uid: &str,
    ) -> Result<(Match, bool), AppError> {
        let now = Utc::now();
        let doc_id = Match::doc_id(round_id, boy_uid, girl_uid);

        let mut transaction = self
            .get_client()?
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        let txn_reads = self.txn_client(&transaction)?;

        // 1. Idempotency: an existing match means the quota was already charged.
        let existing: Option<Match> = txn_reads
            .fluent()
            .select()
            .by_id_in(collections::MATCHES)
            .obj()
            .one(&doc_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to read match in transaction: {}", e)))?;
        if let Some(existing) = existing {
            tracing::debug!(match_id = %doc_id, "Match already exists (idempotent skip)");
            let _ = transaction.rollback().await;
            return Ok((existing, false));
        }

        // 2. Pick the boy's quota-bearing subscription. Reading it here locks
        //    the quota against a concurrent confirm for another girl.
        let subs: Vec<Subscription> = txn_reads
            .fluent()
            .select()
            .from(collections::SUBSCRIPTIONS)
            .filter(|q| q.for_all([q.field("uid").eq(boy_uid)]))
            .obj()
            .query()
            .await
            .map_err(|e| {
                AppError::Database(format!("Failed to read subscriptions in transaction: {}", e))
            })?;
        let sub = pick_active_subscription(&subs)
            .filter(|s| s.remaining_matches > 0)
            .cloned();

        let Some(mut sub) = sub else {
            let _ = transaction.rollback().await;
            return Err(AppError::Conflict(AppError::QUOTA_EXHAUSTED.to_string()));
        };

        sub.remaining_matches -= 1;
        sub.updated_at = now;

        let new_match = Match::new(round_id, boy_uid, girl_uid, now);

        // 3. Match creation and quota decrement commit together.
        self.get_client()?
            .fluent()
            .update()
            .in_col(collections::MATCHES)
            .document_id(&doc_id)
            .object(&new_match)
            .add_to_transaction(&mut transaction)
            .map_err(|e| AppError::Database(format!("Failed to add match to transaction: {}", e)))?;

        self.get_client()?
            .fluent()
            .update()
            .in_col(collections::SUBSCRIPTIONS)
            .document_id(&sub.subscription_id)
            .object(&sub)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add subscription to transaction: {}", e))
            })?;

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;

        tracing::info!(
            match_id = %doc_id,
            boy_uid,
            girl_uid,
            remaining_matches = sub.remaining_matches,
            "Match confirmed"
        );

        Ok((new_match, true))
    }

    // ─── Payment Operations ──────────────────────────────────────

    pub async fn get_payment(&self, payment_id: &str) -> Result<Option<Payment>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::PAYMENTS)
            .obj()
            .one(payment_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    pub async fn upsert_payment(&self, payment: &Payment) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::PAYMENTS)
            .document_id(&payment.payment_id)
            .object(payment)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// A user's payment history, newest first.
    pub async fn payments_for_user(&self, uid: &str) -> Result<Vec<Payment>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::PAYMENTS)
            .filter(|q| q.for_all([q.field("uid").eq(uid)]))
            .order_by([(
                "created_at",
                firestore::FirestoreQueryDirection::Descending,
            )])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Payments by status with pagination, newest first.
    pub async fn payments_by_status(
        &self,
        status: PaymentStatus,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Payment>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::PAYMENTS)
            .filter(|q| q.for_all([q.field("status").eq(status.as_str())]))
            .order_by([(
                "created_at",
                firestore::FirestoreQueryDirection::Descending,
            )])
            .limit(limit)
            .offset(offset)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// All approved payments (round sync and subscription repair).
    pub async fn approved_payments(&self) -> Result<Vec<Payment>, AppError> {
        self.payments_by_status(PaymentStatus::Approved, u32::MAX, 0)
            .await
    }

    /// Atomically approve a payment, grant quota, and join the active round.
    ///
    /// The quota is resolved by the caller before any write happens. The
    /// payment status flip, the subscription grant, and the round-membership
    /// union commit together, so a crash cannot strand an approved payment
    /// without its quota.
    pub async fn approve_payment_txn(
        &self,
        payment_id: &str,
        admin_uid: &str,
        quota: u32,
        rounds_allowed: u32,
        active_round: Option<MatchingRound>,
    ) -> Result<(Payment, Subscription), AppError> {
        let now = Utc::now();

        let mut transaction = self
            .get_client()?
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        let txn_reads = self.txn_client(&transaction)?;

        // Reading the payment here makes a concurrent second approval abort
        // at commit instead of granting quota twice.
        let payment: Payment = txn_reads
            .fluent()
            .select()
            .by_id_in(collections::PAYMENTS)
            .obj()
            .one(payment_id)
            .await
            .map_err(|e| {
                AppError::Database(format!("Failed to read payment in transaction: {}", e))
            })?
            .ok_or_else(|| AppError::NotFound(format!("Payment {} not found", payment_id)))?;

        if payment.status != PaymentStatus::Pending {
            let _ = transaction.rollback().await;
            return Err(AppError::Conflict(
                AppError::PAYMENT_ALREADY_REVIEWED.to_string(),
            ));
        }

        // Grant quota: increment the active subscription, or create one.
        let subs: Vec<Subscription> = txn_reads
            .fluent()
            .select()
            .from(collections::SUBSCRIPTIONS)
            .filter(|q| q.for_all([q.field("uid").eq(payment.uid.as_str())]))
            .obj()
            .query()
            .await
            .map_err(|e| {
                AppError::Database(format!("Failed to read subscriptions in transaction: {}", e))
            })?;
        let subscription = match pick_active_subscription(&subs) {
            Some(existing) => {
                let mut sub = existing.clone();
                sub.remaining_matches += quota;
                sub.updated_at = now;
                sub
            }
            None => Subscription {
                subscription_id: format!("{}_{}", payment.uid, now.timestamp_millis()),
                uid: payment.uid.clone(),
                plan_id: payment.plan_id.clone(),
                status: SubscriptionStatus::Active,
                remaining_matches: quota,
                match_quota: quota,
                rounds_used: 0,
                rounds_allowed,
                created_at: now,
                updated_at: now,
            },
        };

        let mut approved = payment.clone();
        approved.status = PaymentStatus::Approved;
        approved.reviewed_by = Some(admin_uid.to_string());
        approved.reviewed_at = Some(now);

        self.get_client()?
            .fluent()
            .update()
            .in_col(collections::PAYMENTS)
            .document_id(&approved.payment_id)
            .object(&approved)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add payment to transaction: {}", e))
            })?;

        self.get_client()?
            .fluent()
            .update()
            .in_col(collections::SUBSCRIPTIONS)
            .document_id(&subscription.subscription_id)
            .object(&subscription)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add subscription to transaction: {}", e))
            })?;

        // Round membership rides along in the same commit when a round is
        // active. The round is re-read inside the transaction so a racing
        // membership update is not overwritten.
        if let Some(round) = active_round {
            let mut round: MatchingRound = txn_reads
                .fluent()
                .select()
                .by_id_in(collections::ROUNDS)
                .obj()
                .one(&round.round_id)
                .await
                .map_err(|e| {
                    AppError::Database(format!("Failed to read round in transaction: {}", e))
                })?
                .unwrap_or(round);
            if !round.participating_males.contains(&payment.uid) {
                round.participating_males.push(payment.uid.clone());
                self.get_client()?
                    .fluent()
                    .update()
                    .in_col(collections::ROUNDS)
                    .document_id(&round.round_id)
                    .object(&round)
                    .add_to_transaction(&mut transaction)
                    .map_err(|e| {
                        AppError::Database(format!("Failed to add round to transaction: {}", e))
                    })?;
            }
        }

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;

        tracing::info!(
            payment_id,
            uid = %approved.uid,
            quota,
            remaining_matches = subscription.remaining_matches,
            "Payment approved and provisioned"
        );

        Ok((approved, subscription))
    }

    // ─── Subscription Operations ─────────────────────────────────

    /// All subscriptions for a user (unsorted; callers order as needed).
    pub async fn subscriptions_for_user(&self, uid: &str) -> Result<Vec<Subscription>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::SUBSCRIPTIONS)
            .filter(|q| q.for_all([q.field("uid").eq(uid)]))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    pub async fn upsert_subscription(&self, sub: &Subscription) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::SUBSCRIPTIONS)
            .document_id(&sub.subscription_id)
            .object(sub)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Plan Operations ─────────────────────────────────────────

    pub async fn get_plan(&self, plan_id: &str) -> Result<Option<Plan>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::PLANS)
            .obj()
            .one(plan_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    pub async fn upsert_plan(&self, plan: &Plan) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::PLANS)
            .document_id(&plan.plan_id)
            .object(plan)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Referral Operations ─────────────────────────────────────

    pub async fn get_referral(&self, code: &str) -> Result<Option<Referral>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::REFERRALS)
            .obj()
            .one(code)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    pub async fn upsert_referral(&self, referral: &Referral) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::REFERRALS)
            .document_id(&referral.code)
            .object(referral)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    pub async fn get_referral_record(
        &self,
        referred_uid: &str,
    ) -> Result<Option<ReferralRecord>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::REFERRAL_RECORDS)
            .obj()
            .one(referred_uid)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    pub async fn upsert_referral_record(&self, record: &ReferralRecord) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::REFERRAL_RECORDS)
            .document_id(&record.referred_uid)
            .object(record)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    pub async fn get_claim(&self, claim_id: &str) -> Result<Option<ReferralClaim>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::REFERRAL_CLAIMS)
            .obj()
            .one(claim_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    pub async fn upsert_claim(&self, claim: &ReferralClaim) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::REFERRAL_CLAIMS)
            .document_id(&claim.claim_id)
            .object(claim)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Claims by status, newest first.
    pub async fn claims_by_status(
        &self,
        status: ClaimStatus,
    ) -> Result<Vec<ReferralClaim>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::REFERRAL_CLAIMS)
            .filter(|q| q.for_all([q.field("status").eq(status.as_str())]))
            .order_by([(
                "created_at",
                firestore::FirestoreQueryDirection::Descending,
            )])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Atomically approve a claim and credit the claiming user's earnings.
    ///
    /// Re-running on the same claim fails on the pending check instead of
    /// double-crediting, and a credit that would push the user past `cap`
    /// is refused before any write.
    ///
    /// Returns the approved claim and the user's new earnings total.
    pub async fn approve_claim_txn(
        &self,
        claim_id: &str,
        admin_uid: &str,
        cap: u32,
    ) -> Result<(ReferralClaim, u32), AppError> {
        let now = Utc::now();

        let mut transaction = self
            .get_client()?
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        let txn_reads = self.txn_client(&transaction)?;

        // Claim and user are both read inside the transaction: a concurrent
        // approval of this claim, or of another claim by the same user,
        // aborts at commit instead of crediting past the cap.
        let claim: ReferralClaim = txn_reads
            .fluent()
            .select()
            .by_id_in(collections::REFERRAL_CLAIMS)
            .obj()
            .one(claim_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to read claim in transaction: {}", e)))?
            .ok_or_else(|| AppError::NotFound(format!("Claim {} not found", claim_id)))?;

        if claim.status != ClaimStatus::Pending {
            let _ = transaction.rollback().await;
            return Err(AppError::Conflict(
                AppError::CLAIM_ALREADY_REVIEWED.to_string(),
            ));
        }

        let mut user: User = txn_reads
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(&claim.uid)
            .await
            .map_err(|e| AppError::Database(format!("Failed to read user in transaction: {}", e)))?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", claim.uid)))?;

        let new_total = user.referral_earnings_paid + claim.amount;
        if new_total > cap {
            let _ = transaction.rollback().await;
            return Err(AppError::Conflict(
                AppError::REFERRAL_CAP_EXCEEDED.to_string(),
            ));
        }
        user.referral_earnings_paid = new_total;

        let mut approved = claim.clone();
        approved.status = ClaimStatus::Approved;
        approved.reviewed_by = Some(admin_uid.to_string());
        approved.reviewed_at = Some(now);

        self.get_client()?
            .fluent()
            .update()
            .in_col(collections::USERS)
            .document_id(&user.uid)
            .object(&user)
            .add_to_transaction(&mut transaction)
            .map_err(|e| AppError::Database(format!("Failed to add user to transaction: {}", e)))?;

        self.get_client()?
            .fluent()
            .update()
            .in_col(collections::REFERRAL_CLAIMS)
            .document_id(&approved.claim_id)
            .object(&approved)
            .add_to_transaction(&mut transaction)
            .map_err(|e| AppError::Database(format!("Failed to add claim to transaction: {}", e)))?;

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;

        tracing::info!(
            claim_id,
            uid = %approved.uid,
            amount = approved.amount,
            earnings_total = new_total,
            "Referral claim approved"
        );

        Ok((approved, new_total))
    }

    // ─── Notification Operations ─────────────────────────────────

    pub async fn create_notification(
        &self,
        doc_id: &str,
        notification: &Notification,
    ) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::NOTIFICATIONS)
            .document_id(doc_id)
            .object(notification)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Chat Operations ─────────────────────────────────────────

    pub async fn create_chat_message(
        &self,
        doc_id: &str,
        message: &ChatMessage,
    ) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::CHAT_MESSAGES)
            .document_id(doc_id)
            .object(message)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Messages in a match's thread, oldest first.
    pub async fn chat_messages_for_match(
        &self,
        match_id: &str,
    ) -> Result<Vec<ChatMessage>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::CHAT_MESSAGES)
            .filter(|q| q.for_all([q.field("match_id").eq(match_id)]))
            .order_by([("sent_at", firestore::FirestoreQueryDirection::Ascending)])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
