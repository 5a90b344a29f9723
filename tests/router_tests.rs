//! # Router Tests
//!
//! Classification of inbound events, independent of any handler.

mod common;

use common::*;
use survey_bot::messenger::MediaKind;
use survey_bot::router::{Command, InboundCallback, InboundEvent, Route, Router};

#[test]
fn test_commands_win_over_everything() {
    let applicant = user(42, None);
    assert_eq!(
        Router::route(&private_text(&applicant, "/survey my form")),
        Route::Command(Command::Survey)
    );
    assert_eq!(
        Router::route(&chat_text(SURVEY_CHAT, &applicant, "/ban 5")),
        Route::Command(Command::Ban)
    );
    assert_eq!(
        Router::route(&private_text(&applicant, "/unban_request sorry")),
        Route::Command(Command::UnbanRequest)
    );
}

#[test]
fn test_private_text_is_a_survey() {
    let applicant = user(42, None);
    assert_eq!(Router::route(&private_text(&applicant, "hello")), Route::Survey);
    // Unknown commands are still survey text
    assert_eq!(Router::route(&private_text(&applicant, "/help")), Route::Survey);
}

#[test]
fn test_group_chat_chatter_is_ignored() {
    let staff = user(7, None);
    assert_eq!(
        Router::route(&chat_text(SURVEY_CHAT, &staff, "looks good")),
        Route::Ignore
    );
    assert_eq!(
        Router::route(&chat_text(UNBAN_CHAT, &staff, "agreed")),
        Route::Ignore
    );
}

#[test]
fn test_media_classification() {
    let applicant = user(42, None);
    assert_eq!(
        Router::route(&private_media(&applicant, MediaKind::Photo, "p", None, None)),
        Route::Media
    );
    assert_eq!(
        Router::route(&private_media(&applicant, MediaKind::Audio, "a", Some("form"), Some("g1"))),
        Route::MediaGroupPart
    );
    assert_eq!(
        Router::route(&private_media(
            &applicant,
            MediaKind::Photo,
            "p",
            Some("/unban_request hi"),
            None
        )),
        Route::Ignore
    );
}

#[test]
fn test_non_message_events() {
    assert_eq!(
        Router::route(&InboundEvent::MemberKicked(user(1, None))),
        Route::MemberKicked
    );
    assert_eq!(
        Router::route(&InboundEvent::Callback(InboundCallback {
            origin_chat: Some(UNBAN_CHAT),
            from: user(7, None),
            data: Some("unban_accept_1".to_string()),
        })),
        Route::UnbanDecision
    );
}

#[tokio::test]
async fn test_review_chat_chatter_is_not_relayed() {
    let h = harness().await;

    h.router
        .dispatch(chat_text(SURVEY_CHAT, &user(7, None), "nice form"))
        .await;

    assert!(h.messenger.sent().is_empty());
}
