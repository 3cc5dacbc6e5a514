//! Keychain contract tests
//!
//! The same behavior is checked against every shipped storage backend.

use keychain_core::{Item, KeychainError, KeychainEvent, Options};
use keychain_test_utils::{TestKeychain, sample_item, sample_items};

macro_rules! contract_tests {
    ($backend:ident, $make:expr) => {
        mod $backend {
            use super::*;

            async fn harness() -> TestKeychain {
                $make.await
            }

            #[tokio::test]
            async fn test_unknown_identifier_is_not_found() {
                let h = harness().await;
                let err = h.keychain.item("never-added").await.unwrap_err();
                assert!(matches!(err, KeychainError::ItemNotFound { .. }));
            }

            #[tokio::test]
            async fn test_add_then_item_round_trips() {
                let h = harness().await;
                let item = sample_item("mail").with_option("cert", vec![0u8, 1, 2]);

                h.keychain.add(&item).await.unwrap();

                let stored = h.keychain.item("mail").await.unwrap();
                assert_eq!(stored, item);
            }

            #[tokio::test]
            async fn test_update_replaces_attributes() {
                let h = harness().await;
                let first = sample_item("mail");
                let second = Item::new("mail", true, Options::new()).with_option("port", 465i64);

                h.keychain.add(&first).await.unwrap();
                h.keychain.update(&second).await.unwrap();

                let stored = h.keychain.item("mail").await.unwrap();
                assert_eq!(stored, second);
                assert_ne!(stored, first);
            }

            #[tokio::test]
            async fn test_remove_clears_item_and_password() {
                let h = harness().await;
                let item = sample_item("mail");
                h.keychain.add(&item).await.unwrap();
                h.keychain.set_password(Some("pw"), "mail").await.unwrap();

                // Identity is by identifier; options do not need to match.
                h.keychain.remove(&Item::visible("mail")).await.unwrap();

                assert!(matches!(
                    h.keychain.item("mail").await,
                    Err(KeychainError::ItemNotFound { .. })
                ));
                assert!(matches!(
                    h.keychain.password_for_item("mail").await,
                    Err(KeychainError::ItemNotFound { .. })
                ));
            }

            #[tokio::test]
            async fn test_password_set_and_clear() {
                let h = harness().await;
                h.keychain.add(&sample_item("mail")).await.unwrap();

                h.keychain.set_password(Some("secret123"), "mail").await.unwrap();
                let password = h.keychain.password_for_item("mail").await.unwrap();
                assert_eq!(password.to_str().unwrap(), "secret123");

                h.keychain.set_password(None, "mail").await.unwrap();
                assert!(matches!(
                    h.keychain.password_for_item("mail").await,
                    Err(KeychainError::NoPassword { .. })
                ));

                // Clearing the password keeps the item.
                assert!(h.keychain.contains("mail").await.unwrap());
            }

            #[tokio::test]
            async fn test_new_item_has_no_password() {
                let h = harness().await;
                h.keychain.add(&sample_item("mail")).await.unwrap();
                assert!(matches!(
                    h.keychain.password_for_item("mail").await,
                    Err(KeychainError::NoPassword { .. })
                ));
            }

            #[tokio::test]
            async fn test_remove_all_items() {
                let h = harness().await;
                let items = sample_items(3);
                for item in &items {
                    h.keychain.add(item).await.unwrap();
                    h.keychain
                        .set_password(Some("pw"), item.identifier())
                        .await
                        .unwrap();
                }

                h.keychain.remove_all_items().await.unwrap();

                assert!(h.keychain.items().await.unwrap().is_empty());
                for item in &items {
                    assert!(matches!(
                        h.keychain.item(item.identifier()).await,
                        Err(KeychainError::ItemNotFound { .. })
                    ));
                    assert!(matches!(
                        h.keychain.password_for_item(item.identifier()).await,
                        Err(KeychainError::ItemNotFound { .. })
                    ));
                }
            }

            #[tokio::test]
            async fn test_remove_all_items_on_empty_keychain() {
                let h = harness().await;
                h.keychain.remove_all_items().await.unwrap();
                assert!(h.keychain.items().await.unwrap().is_empty());
            }

            #[tokio::test]
            async fn test_operations_on_missing_item_fail_without_events() {
                let h = harness().await;
                let ghost = sample_item("ghost");

                assert!(matches!(
                    h.keychain.update(&ghost).await,
                    Err(KeychainError::ItemNotFound { .. })
                ));
                assert!(matches!(
                    h.keychain.remove(&ghost).await,
                    Err(KeychainError::ItemNotFound { .. })
                ));
                assert!(matches!(
                    h.keychain.set_password(Some("pw"), "ghost").await,
                    Err(KeychainError::ItemNotFound { .. })
                ));
                assert!(matches!(
                    h.keychain.set_password(None, "ghost").await,
                    Err(KeychainError::ItemNotFound { .. })
                ));

                assert!(h.listener.is_empty());
                assert!(matches!(
                    h.keychain.item("ghost").await,
                    Err(KeychainError::ItemNotFound { .. })
                ));
            }

            #[tokio::test]
            async fn test_duplicate_add_fails_without_event() {
                let h = harness().await;
                h.keychain.add(&sample_item("mail")).await.unwrap();
                h.listener.take();

                let err = h.keychain.add(&Item::visible("mail")).await.unwrap_err();
                assert!(matches!(err, KeychainError::DuplicateItem { .. }));
                assert!(h.listener.is_empty());

                // The original value is untouched.
                assert_eq!(h.keychain.item("mail").await.unwrap(), sample_item("mail"));
            }

            #[tokio::test]
            async fn test_each_mutation_emits_one_event() {
                let h = harness().await;
                let service = h.keychain.service_name().to_string();
                let item = sample_item("mail");
                let updated = Item::new("mail", true, Options::new());

                h.keychain.add(&item).await.unwrap();
                assert_eq!(
                    h.listener.take(),
                    vec![KeychainEvent::ItemAdded {
                        service: service.clone(),
                        item: item.clone()
                    }]
                );

                h.keychain.update(&updated).await.unwrap();
                assert_eq!(
                    h.listener.take(),
                    vec![KeychainEvent::ItemUpdated {
                        service: service.clone(),
                        item: updated.clone()
                    }]
                );

                h.keychain.set_password(Some("pw"), "mail").await.unwrap();
                assert!(h.listener.is_empty());

                h.keychain.remove(&updated).await.unwrap();
                assert_eq!(
                    h.listener.take(),
                    vec![KeychainEvent::ItemRemoved {
                        service: service.clone(),
                        item: updated
                    }]
                );

                h.keychain.remove_all_items().await.unwrap();
                assert_eq!(
                    h.listener.take(),
                    vec![KeychainEvent::AllItemsRemoved { service }]
                );
            }

            #[tokio::test]
            async fn test_items_include_invisible() {
                let h = harness().await;
                let visible = sample_item("b-visible");
                let hidden = Item::new("a-hidden", true, Options::new());
                h.keychain.add(&visible).await.unwrap();
                h.keychain.add(&hidden).await.unwrap();

                let all = h.keychain.items().await.unwrap();
                assert_eq!(all, vec![hidden, visible.clone()]);

                let shown = h.keychain.visible_items().await.unwrap();
                assert_eq!(shown, vec![visible]);
            }
        }
    };
}

contract_tests!(memory, async { TestKeychain::memory("com.example.mail") });
contract_tests!(
    encrypted_file,
    TestKeychain::encrypted_file("com.example.mail")
);
