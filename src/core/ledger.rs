//! Orchestration of the engine components for one owner at a time.
//!
//! A submitted transaction is validated, normalized, committed and only then
//! aggregated, so budget evaluation always sees the entry it was triggered by.

use super::currency::Currency;
use super::error::{LedgerError, Result, ValidationError};
use super::models::{
    BudgetLimit, Goal, MonetaryEntry, NewGoal, NewTransaction, NotificationEvent,
    NotificationKind, OwnerId, RecurrenceRule,
};
use super::normalizer::CurrencyNormalizer;
use super::notify::{
    Dispatch, NotificationDispatcher, anomaly_fingerprint, breach_fingerprint, goal_fingerprint,
    recurring_fingerprint,
};
use super::recurrence::materialize_due;
use super::spending::{
    AnomalyRule, BudgetStatus, BudgetWindow, DateWindow, SpendingTrend, budget_status,
    check_budgets, compute_trends_in, detect_anomaly, limits_by_category,
};
use super::store::EntityStore;
use crate::store::MemoryStore;
use chrono::{DateTime, TimeDelta, Utc};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Collaborator stores, one per record kind.
#[derive(Clone)]
pub struct LedgerStores {
    pub transactions: Arc<dyn EntityStore<MonetaryEntry>>,
    pub budgets: Arc<dyn EntityStore<BudgetLimit>>,
    pub goals: Arc<dyn EntityStore<Goal>>,
    pub notifications: Arc<dyn EntityStore<NotificationEvent>>,
}

impl LedgerStores {
    pub fn in_memory() -> Self {
        Self {
            transactions: Arc::new(MemoryStore::<MonetaryEntry>::new()),
            budgets: Arc::new(MemoryStore::<BudgetLimit>::new()),
            goals: Arc::new(MemoryStore::<Goal>::new()),
            notifications: Arc::new(MemoryStore::<NotificationEvent>::new()),
        }
    }
}

pub struct LedgerService {
    normalizer: CurrencyNormalizer,
    stores: LedgerStores,
    dispatcher: NotificationDispatcher,
    budget_window: BudgetWindow,
    anomaly: AnomalyRule,
    // One limit per (owner, category) relies on upserts not interleaving.
    budget_lock: Mutex<()>,
}

impl LedgerService {
    pub fn new(normalizer: CurrencyNormalizer, stores: LedgerStores) -> Self {
        let dispatcher = NotificationDispatcher::new(Arc::clone(&stores.notifications));
        Self {
            normalizer,
            stores,
            dispatcher,
            budget_window: BudgetWindow::default(),
            anomaly: AnomalyRule::default(),
            budget_lock: Mutex::new(()),
        }
    }

    pub fn with_cooldown(mut self, cooldown: TimeDelta) -> Self {
        self.dispatcher = self.dispatcher.with_cooldown(cooldown);
        self
    }

    pub fn with_budget_window(mut self, window: BudgetWindow) -> Self {
        self.budget_window = window;
        self
    }

    pub fn with_anomaly_rule(mut self, rule: AnomalyRule) -> Self {
        self.anomaly = rule;
        self
    }

    pub fn accounting_currency(&self) -> Currency {
        self.normalizer.accounting_currency()
    }

    pub fn budget_window(&self) -> BudgetWindow {
        self.budget_window
    }

    pub async fn normalize(&self, amount: Decimal, currency: &str) -> Result<Decimal> {
        self.normalizer.normalize(amount, currency).await
    }

    pub async fn submit_transaction(
        &self,
        owner: &OwnerId,
        request: NewTransaction,
    ) -> Result<MonetaryEntry> {
        let timestamp = request.date.unwrap_or_else(Utc::now);
        let request = NewTransaction {
            date: Some(timestamp),
            ..request
        };
        let currency = request.validate()?;
        let normalized_amount = self
            .normalizer
            .normalize(request.amount, currency.code())
            .await?;

        let entry = MonetaryEntry {
            id: Uuid::new_v4(),
            owner: owner.clone(),
            kind: request.kind,
            amount: request.amount,
            currency: currency.code().to_string(),
            category: request.category.trim().to_string(),
            tags: request.tags,
            normalized_amount,
            timestamp,
            recurrence: request.recurrence.map(|r| RecurrenceRule {
                pattern: r.pattern,
                end_date: r.end_date,
                last_materialized: timestamp,
            }),
            origin: None,
        };
        let entry = self.stores.transactions.create(entry).await?;
        info!(
            %owner,
            id = %entry.id,
            kind = ?entry.kind,
            amount = %entry.normalized_amount,
            "Transaction recorded"
        );

        if entry.is_expense() {
            let entries = self.stores.transactions.find_by_owner(owner).await?;
            self.evaluate_budget(owner, &entry.category, entry.timestamp, &entries)
                .await?;
            self.check_anomaly(owner, &entry, &entries).await?;
        }
        Ok(entry)
    }

    /// Replaces a transaction's fields, re-validating and re-normalizing.
    ///
    /// A recurrence that already exists keeps its progress.
    pub async fn update_transaction(
        &self,
        owner: &OwnerId,
        id: Uuid,
        request: NewTransaction,
    ) -> Result<MonetaryEntry> {
        let existing = self
            .stores
            .transactions
            .find_by_id_and_owner(id, owner)
            .await?
            .ok_or_else(|| LedgerError::not_found("transaction", id))?;

        let timestamp = request.date.unwrap_or(existing.timestamp);
        let request = NewTransaction {
            date: Some(timestamp),
            ..request
        };
        let currency = request.validate()?;
        let normalized_amount = self
            .normalizer
            .normalize(request.amount, currency.code())
            .await?;

        let previous_progress = existing.recurrence.as_ref().map(|r| r.last_materialized);
        let updated = MonetaryEntry {
            kind: request.kind,
            amount: request.amount,
            currency: currency.code().to_string(),
            category: request.category.trim().to_string(),
            tags: request.tags,
            normalized_amount,
            timestamp,
            recurrence: request.recurrence.map(|r| RecurrenceRule {
                pattern: r.pattern,
                end_date: r.end_date,
                last_materialized: previous_progress.unwrap_or(timestamp),
            }),
            ..existing
        };
        let updated = self
            .stores
            .transactions
            .update_by_id_and_owner(id, owner, updated)
            .await?
            .ok_or_else(|| LedgerError::not_found("transaction", id))?;
        debug!(%owner, %id, "Transaction updated");

        if updated.is_expense() {
            let entries = self.stores.transactions.find_by_owner(owner).await?;
            self.evaluate_budget(owner, &updated.category, updated.timestamp, &entries)
                .await?;
        }
        Ok(updated)
    }

    pub async fn delete_transaction(&self, owner: &OwnerId, id: Uuid) -> Result<MonetaryEntry> {
        self.stores
            .transactions
            .delete_by_id_and_owner(id, owner)
            .await?
            .ok_or_else(|| LedgerError::not_found("transaction", id))
    }

    /// Owner's transactions, oldest first.
    pub async fn list_transactions(&self, owner: &OwnerId) -> Result<Vec<MonetaryEntry>> {
        let mut entries = self.stores.transactions.find_by_owner(owner).await?;
        entries.sort_by_key(|e| e.timestamp);
        Ok(entries)
    }

    /// Creates or replaces the limit for `category`.
    pub async fn set_budget(
        &self,
        owner: &OwnerId,
        category: &str,
        limit: Decimal,
    ) -> Result<BudgetLimit> {
        let category = category.trim();
        if category.is_empty() {
            return Err(ValidationError::MissingField("category").into());
        }
        if limit < Decimal::ZERO {
            return Err(ValidationError::NegativeLimit(limit.to_string()).into());
        }

        let _guard = self.budget_lock.lock().await;
        let existing = self
            .stores
            .budgets
            .find_by_owner(owner)
            .await?
            .into_iter()
            .find(|b| b.category == category);

        match existing {
            Some(current) => {
                let id = current.id;
                let updated = BudgetLimit { limit, ..current };
                info!(%owner, category, %limit, "Budget limit replaced");
                self.stores
                    .budgets
                    .update_by_id_and_owner(id, owner, updated)
                    .await?
                    .ok_or_else(|| LedgerError::not_found("budget", id))
            }
            None => {
                info!(%owner, category, %limit, "Budget limit created");
                self.stores
                    .budgets
                    .create(BudgetLimit {
                        id: Uuid::new_v4(),
                        owner: owner.clone(),
                        category: category.to_string(),
                        limit,
                        created_at: Utc::now(),
                    })
                    .await
            }
        }
    }

    pub async fn delete_budget(&self, owner: &OwnerId, category: &str) -> Result<BudgetLimit> {
        let category = category.trim();
        let _guard = self.budget_lock.lock().await;
        let budget = self
            .stores
            .budgets
            .find_by_owner(owner)
            .await?
            .into_iter()
            .find(|b| b.category == category)
            .ok_or_else(|| LedgerError::not_found("budget", category))?;
        self.stores
            .budgets
            .delete_by_id_and_owner(budget.id, owner)
            .await?
            .ok_or_else(|| LedgerError::not_found("budget", category))
    }

    /// Owner's budget limits ordered by category.
    pub async fn list_budgets(&self, owner: &OwnerId) -> Result<Vec<BudgetLimit>> {
        let mut budgets = self.stores.budgets.find_by_owner(owner).await?;
        budgets.sort_by(|a, b| a.category.cmp(&b.category));
        Ok(budgets)
    }

    pub async fn create_goal(&self, owner: &OwnerId, request: NewGoal) -> Result<Goal> {
        request.validate()?;
        let goal = self
            .stores
            .goals
            .create(Goal {
                id: Uuid::new_v4(),
                owner: owner.clone(),
                title: request.title.trim().to_string(),
                description: request.description,
                target_amount: request.target_amount,
                target_date: request.target_date,
                completed: false,
                created_at: Utc::now(),
            })
            .await?;
        info!(%owner, id = %goal.id, "Goal created");

        self.dispatcher
            .notify(
                owner,
                NotificationKind::Goal,
                format!("New goal created: {}", goal.title),
                &goal_fingerprint(goal.id),
            )
            .await?;
        Ok(goal)
    }

    pub async fn update_goal(&self, owner: &OwnerId, id: Uuid, request: NewGoal) -> Result<Goal> {
        request.validate()?;
        let existing = self
            .stores
            .goals
            .find_by_id_and_owner(id, owner)
            .await?
            .ok_or_else(|| LedgerError::not_found("goal", id))?;
        let updated = Goal {
            title: request.title.trim().to_string(),
            description: request.description,
            target_amount: request.target_amount,
            target_date: request.target_date,
            ..existing
        };
        self.stores
            .goals
            .update_by_id_and_owner(id, owner, updated)
            .await?
            .ok_or_else(|| LedgerError::not_found("goal", id))
    }

    pub async fn complete_goal(&self, owner: &OwnerId, id: Uuid) -> Result<Goal> {
        let mut goal = self
            .stores
            .goals
            .find_by_id_and_owner(id, owner)
            .await?
            .ok_or_else(|| LedgerError::not_found("goal", id))?;
        goal.completed = true;
        self.stores
            .goals
            .update_by_id_and_owner(id, owner, goal)
            .await?
            .ok_or_else(|| LedgerError::not_found("goal", id))
    }

    pub async fn delete_goal(&self, owner: &OwnerId, id: Uuid) -> Result<Goal> {
        self.stores
            .goals
            .delete_by_id_and_owner(id, owner)
            .await?
            .ok_or_else(|| LedgerError::not_found("goal", id))
    }

    pub async fn list_goals(&self, owner: &OwnerId) -> Result<Vec<Goal>> {
        let mut goals = self.stores.goals.find_by_owner(owner).await?;
        goals.sort_by_key(|g| g.created_at);
        Ok(goals)
    }

    /// Materializes every recurring template of `owner` due by `as_of`.
    ///
    /// Each occurrence is normalized at the current rate and committed
    /// before the template's progress is saved, so a failure part way
    /// leaves the template pointing at the last occurrence actually posted.
    pub async fn post_recurring(
        &self,
        owner: &OwnerId,
        as_of: DateTime<Utc>,
    ) -> Result<Vec<MonetaryEntry>> {
        let templates: Vec<MonetaryEntry> = self
            .stores
            .transactions
            .find_by_owner(owner)
            .await?
            .into_iter()
            .filter(|e| e.recurrence.is_some())
            .collect();

        let mut posted = Vec::new();
        // (category, budget period) -> a moment inside that period
        let mut touched = BTreeMap::new();
        for mut template in templates {
            if template.recurrence.as_ref().is_some_and(RecurrenceRule::is_exhausted) {
                debug!(%owner, id = %template.id, "Skipping exhausted recurrence");
                continue;
            }

            let mut progress = template.clone();
            for mut occurrence in materialize_due(&mut template, as_of)? {
                occurrence.normalized_amount = self
                    .normalizer
                    .normalize(occurrence.amount, &occurrence.currency)
                    .await?;
                let occurrence = self.stores.transactions.create(occurrence).await?;

                if let Some(rule) = progress.recurrence.as_mut() {
                    rule.last_materialized = occurrence.timestamp;
                }
                progress = self
                    .stores
                    .transactions
                    .update_by_id_and_owner(progress.id, owner, progress.clone())
                    .await?
                    .ok_or_else(|| LedgerError::not_found("transaction", progress.id))?;

                let day = occurrence.timestamp.date_naive();
                self.dispatcher
                    .notify(
                        owner,
                        NotificationKind::Recurring,
                        format!(
                            "Recurring {} of {} {} posted to '{}' for {}",
                            occurrence.kind,
                            occurrence.amount,
                            occurrence.currency,
                            occurrence.category,
                            day
                        ),
                        &recurring_fingerprint(progress.id, day),
                    )
                    .await?;

                if occurrence.is_expense() {
                    let period = self.budget_window.period_label(occurrence.timestamp);
                    touched
                        .entry((occurrence.category.clone(), period))
                        .or_insert(occurrence.timestamp);
                }
                posted.push(occurrence);
            }
        }
        info!(%owner, %as_of, count = posted.len(), "Recurring transactions posted");

        if !touched.is_empty() {
            let entries = self.stores.transactions.find_by_owner(owner).await?;
            for ((category, _), at) in &touched {
                self.evaluate_budget(owner, category, *at, &entries).await?;
            }
        }
        Ok(posted)
    }

    pub async fn spending_trends(
        &self,
        owner: &OwnerId,
        window: &DateWindow,
    ) -> Result<SpendingTrend> {
        let entries = self.stores.transactions.find_by_owner(owner).await?;
        Ok(compute_trends_in(&entries, window))
    }

    pub async fn budget_report(
        &self,
        owner: &OwnerId,
        window: &DateWindow,
    ) -> Result<Vec<BudgetStatus>> {
        let trends = self.spending_trends(owner, window).await?;
        let limits = self.stores.budgets.find_by_owner(owner).await?;
        Ok(budget_status(&trends, &limits_by_category(&limits)))
    }

    pub async fn list_notifications(&self, owner: &OwnerId) -> Result<Vec<NotificationEvent>> {
        self.dispatcher.list(owner).await
    }

    pub async fn mark_notification_read(
        &self,
        owner: &OwnerId,
        id: Uuid,
    ) -> Result<NotificationEvent> {
        self.dispatcher.mark_read(owner, id).await
    }

    pub async fn notify_custom(
        &self,
        owner: &OwnerId,
        message: &str,
        fingerprint: &str,
    ) -> Result<Dispatch> {
        self.dispatcher
            .notify(owner, NotificationKind::Custom, message, fingerprint)
            .await
    }

    /// Checks `category` over the budget period containing `at`.
    async fn evaluate_budget(
        &self,
        owner: &OwnerId,
        category: &str,
        at: DateTime<Utc>,
        entries: &[MonetaryEntry],
    ) -> Result<Option<Dispatch>> {
        let budgets = self.stores.budgets.find_by_owner(owner).await?;
        let Some(budget) = budgets.iter().find(|b| b.category == category) else {
            return Ok(None);
        };

        let window = self.budget_window.window_for(at);
        let in_category = entries.iter().filter(|e| e.category == category);
        let trends = compute_trends_in(in_category, &window);
        let limits = BTreeMap::from([(budget.category.clone(), budget.limit)]);
        let Some(breach) = check_budgets(&trends, &limits).into_iter().next() else {
            return Ok(None);
        };

        warn!(%owner, category, total = %breach.total, limit = %breach.limit, "Budget exceeded");
        let currency = self.accounting_currency();
        let message = format!(
            "Spending in '{}' reached {} {currency}, over the limit of {} {currency}",
            breach.category, breach.total, breach.limit
        );
        self.dispatcher
            .notify(
                owner,
                NotificationKind::Spending,
                message,
                &breach_fingerprint(category, &self.budget_window.period_label(at)),
            )
            .await
            .map(Some)
    }

    async fn check_anomaly(
        &self,
        owner: &OwnerId,
        entry: &MonetaryEntry,
        entries: &[MonetaryEntry],
    ) -> Result<Option<Dispatch>> {
        let Some(anomaly) = detect_anomaly(entry, entries, &self.anomaly) else {
            return Ok(None);
        };

        warn!(
            %owner,
            id = %entry.id,
            amount = %anomaly.amount,
            average = %anomaly.average,
            "Unusual expense"
        );
        let currency = self.accounting_currency();
        let message = format!(
            "Unusual expense of {} {currency} in '{}' (average {} {currency})",
            anomaly.amount, anomaly.category, anomaly.average
        );
        self.dispatcher
            .notify(
                owner,
                NotificationKind::Spending,
                message,
                &anomaly_fingerprint(entry.id),
            )
            .await
            .map(Some)
    }
}
