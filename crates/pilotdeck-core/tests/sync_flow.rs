//! End-to-end tests of the section synchronization flow.
//!
//! These tests wire real repositories (in-memory `SQLite`) with mock section
//! handlers and a mock SSO refresher, without touching the network.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use pilotdeck_core::{
    AuthContext, Character, CharacterId, CharacterRepository, CharacterToken, CredentialManager,
    PayloadRepository, Result, Section, SectionHandler, SectionRegistry, SectionStatusRepository,
    SectionUpdater, StatusCache, TokenRefresher,
};
use pilotdeck_sso::Token;
use serde_json::{Value, json};

/// Refresher issuing a new access token on every call.
#[derive(Default)]
struct Refresher {
    calls: AtomicUsize,
}

#[async_trait]
impl TokenRefresher for Refresher {
    async fn refresh(&self, token: &Token) -> pilotdeck_sso::Result<Token> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        token.refresh_token()?;
        tokio::time::sleep(Duration::from_millis(20)).await;
        Ok(Token::new(format!("fresh-{n}"), "Bearer")
            .with_expires_at(Utc::now() + TimeDelta::minutes(20)))
    }
}

/// Handler returning a payload that embeds the access token it was given.
struct EchoSection {
    section: Section,
    payloads: Arc<PayloadRepository>,
}

#[async_trait]
impl SectionHandler for EchoSection {
    async fn fetch(&self, auth: &AuthContext) -> Result<Value> {
        tokio::time::sleep(Duration::from_millis(10)).await;
        Ok(json!({
            "character_id": auth.character_id.0,
            "section": self.section.as_str(),
            "token": auth.access_token,
        }))
    }

    async fn persist(&self, character_id: CharacterId, payload: &Value) -> Result<()> {
        self.payloads.put(character_id, self.section, payload).await
    }

    async fn remove(&self, character_id: CharacterId) -> Result<()> {
        self.payloads.delete(character_id, self.section).await
    }
}

struct App {
    characters: Arc<CharacterRepository>,
    statuses: Arc<SectionStatusRepository>,
    payloads: Arc<PayloadRepository>,
    registry: Arc<SectionRegistry>,
    refresher: Arc<Refresher>,
    updater: Arc<SectionUpdater>,
    cache: Arc<StatusCache>,
}

const SECTIONS: [Section; 3] = [Section::Skills, Section::Skillqueue, Section::Attributes];

async fn app(token_expires_in: TimeDelta) -> App {
    let characters = Arc::new(CharacterRepository::in_memory().await.unwrap());
    let statuses = Arc::new(SectionStatusRepository::in_memory().await.unwrap());
    let payloads = Arc::new(PayloadRepository::in_memory().await.unwrap());

    characters
        .save(&Character::new(CharacterId(1), "Erik Kalkoken"))
        .await
        .unwrap();
    characters
        .save_token(&CharacterToken::new(
            CharacterId(1),
            Token::new("stale", "Bearer")
                .with_refresh_token("refresh")
                .with_expires_at(Utc::now() + token_expires_in)
                .with_scope("esi-skills.read_skills.v1 esi-skills.read_skillqueue.v1"),
        ))
        .await
        .unwrap();

    let mut registry = SectionRegistry::new();
    for section in SECTIONS {
        registry.register(
            section,
            Arc::new(EchoSection {
                section,
                payloads: Arc::clone(&payloads),
            }),
        );
    }
    let registry = Arc::new(registry);

    let cache = Arc::new(StatusCache::for_registry(&registry));
    cache.init_from_storage(&characters, &statuses).await.unwrap();

    let refresher = Arc::new(Refresher::default());
    let credentials = Arc::new(CredentialManager::new(
        Arc::clone(&characters),
        refresher.clone(),
    ));
    let updater = Arc::new(SectionUpdater::new(
        Arc::clone(&registry),
        credentials,
        Arc::clone(&characters),
        Arc::clone(&statuses),
        Arc::clone(&cache),
    ));

    App {
        characters,
        statuses,
        payloads,
        registry,
        refresher,
        updater,
        cache,
    }
}

#[tokio::test]
async fn expiring_token_is_refreshed_once_for_all_sections() {
    let app = app(TimeDelta::seconds(30)).await;

    let outcomes = app.updater.update_all_due(&[CharacterId(1)]).await;
    assert_eq!(outcomes.len(), SECTIONS.len());
    assert!(outcomes.iter().all(|o| matches!(o.result, Ok(true))));
    assert_eq!(app.refresher.calls.load(Ordering::SeqCst), 1);

    let token = app.characters.get_token(CharacterId(1)).await.unwrap().unwrap();
    assert_eq!(token.token.access_token, "fresh-1");
    assert_eq!(token.token.refresh_token.as_deref(), Some("refresh"));

    let payload = app
        .payloads
        .get(CharacterId(1), Section::Skills)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payload["token"], "fresh-1");

    let summary = app.cache.summary(Utc::now());
    assert_eq!(summary.total, 3);
    assert_eq!(summary.current, 3);
    assert!(summary.is_healthy());
}

#[tokio::test]
async fn second_tick_finds_nothing_due() {
    let app = app(TimeDelta::minutes(20)).await;

    assert_eq!(app.updater.update_all_due(&[CharacterId(1)]).await.len(), 3);
    assert!(app.updater.update_all_due(&[CharacterId(1)]).await.is_empty());
    assert_eq!(app.refresher.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn missing_scope_fails_only_that_section() {
    let app = app(TimeDelta::minutes(20)).await;

    // The token was not granted the mail scopes.
    let mut registry = SectionRegistry::new();
    registry.register(
        Section::Mails,
        Arc::new(EchoSection {
            section: Section::Mails,
            payloads: Arc::clone(&app.payloads),
        }),
    );
    for section in app.registry.sections() {
        let registered = app.registry.get(section).unwrap();
        registry.register(section, Arc::clone(&registered.handler));
    }
    let registry = Arc::new(registry);
    let cache = Arc::new(StatusCache::for_registry(&registry));
    cache.init_from_storage(&app.characters, &app.statuses).await.unwrap();
    let updater = Arc::new(SectionUpdater::new(
        registry,
        Arc::new(CredentialManager::new(
            Arc::clone(&app.characters),
            app.refresher.clone(),
        )),
        Arc::clone(&app.characters),
        Arc::clone(&app.statuses),
        Arc::clone(&cache),
    ));

    let outcomes = updater.update_all_due(&[CharacterId(1)]).await;
    assert_eq!(outcomes.len(), 4);
    let failed: Vec<_> = outcomes.iter().filter(|o| o.result.is_err()).collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].section, Section::Mails);

    // Credential failures are not recorded, so the section stays due.
    assert!(
        app.statuses
            .get(CharacterId(1), Section::Mails)
            .await
            .unwrap()
            .is_none()
    );
    assert!(
        updater
            .scheduler()
            .is_expired(CharacterId(1), Section::Mails)
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn cache_is_rebuilt_from_storage() {
    let app = app(TimeDelta::minutes(20)).await;
    app.updater
        .run(CharacterId(1), Section::Skillqueue, false)
        .await
        .unwrap();

    let rebuilt = StatusCache::for_registry(&app.registry);
    rebuilt
        .init_from_storage(&app.characters, &app.statuses)
        .await
        .unwrap();

    assert_eq!(
        rebuilt.get(CharacterId(1), Section::Skillqueue),
        app.cache.get(CharacterId(1), Section::Skillqueue)
    );
    assert_eq!(
        rebuilt.character_name(CharacterId(1)).as_deref(),
        Some("Erik Kalkoken")
    );
    let summary = rebuilt.character_summary(CharacterId(1), Utc::now());
    assert_eq!(summary.current, 1);
    assert_eq!(summary.missing, 2);
}

#[tokio::test]
async fn removed_character_leaves_no_data_behind() {
    let app = app(TimeDelta::minutes(20)).await;
    app.updater.update_all_due(&[CharacterId(1)]).await;
    assert!(
        app.payloads
            .get(CharacterId(1), Section::Skills)
            .await
            .unwrap()
            .is_some()
    );

    app.updater.remove_character(CharacterId(1)).await.unwrap();

    for section in SECTIONS {
        assert!(
            app.payloads
                .get(CharacterId(1), section)
                .await
                .unwrap()
                .is_none()
        );
    }
    assert!(app.statuses.list(CharacterId(1)).await.unwrap().is_empty());
    assert!(app.characters.get(CharacterId(1)).await.unwrap().is_none());
    assert_eq!(app.cache.summary(Utc::now()).total, 0);
}
