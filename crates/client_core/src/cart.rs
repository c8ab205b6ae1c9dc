//! Cart state, its persisted mirror, and change notifications.

use std::sync::Arc;

use shared::domain::{Cart, Product, ProductId};
use storage::{read_json, write_json, KeyValueStore};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::observable::{Observable, Subscription};

/// Storage key of the persisted cart.
pub const CART_KEY: &str = "Cart";

pub struct CartStore {
    storage: Arc<dyn KeyValueStore>,
    cart: Mutex<Cart>,
    snapshots: Observable<Cart>,
}

impl CartStore {
    /// Restores the persisted cart, repairing duplicate lines and stale
    /// amounts. Unreadable state falls back to an empty cart; this never
    /// fails.
    pub async fn load(storage: Arc<dyn KeyValueStore>) -> Self {
        let cart = load_cart(storage.as_ref()).await;
        debug!(
            lines = cart.items.len(),
            durable = storage.is_durable(),
            "cart: loaded"
        );
        Self {
            storage,
            snapshots: Observable::new(cart.clone()),
            cart: Mutex::new(cart),
        }
    }

    /// Adds a line with quantity 1. A product already in the cart is left
    /// as is.
    pub async fn add(&self, product: Product) {
        self.mutate(|cart| {
            let product_id = product.id.clone();
            if !cart.add(product) {
                debug!(%product_id, "cart: product already present, add ignored");
            }
        })
        .await;
    }

    pub async fn remove(&self, product_id: &ProductId) {
        self.mutate(|cart| {
            if !cart.remove(product_id) {
                debug!(%product_id, "cart: remove of absent product");
            }
        })
        .await;
    }

    /// Sets a line's quantity. Absent products and amounts too large to
    /// total are ignored, though the unchanged cart is still republished.
    pub async fn set_quantity(&self, product_id: &ProductId, quantity: u32) {
        self.mutate(|cart| {
            if !cart.set_quantity(product_id, quantity) {
                debug!(%product_id, quantity, "cart: quantity change ignored");
            }
        })
        .await;
    }

    pub async fn clear(&self) {
        self.mutate(|cart| *cart = Cart::default()).await;
    }

    pub fn current(&self) -> Cart {
        self.snapshots.current()
    }

    pub fn subscribe(&self) -> Subscription<Cart> {
        self.snapshots.subscribe()
    }

    /// Applies `change`, then recomputes totals, persists and publishes while
    /// still holding the cart lock so observers see mutations in order.
    async fn mutate(&self, change: impl FnOnce(&mut Cart)) {
        let mut cart = self.cart.lock().await;
        change(&mut cart);
        cart.recompute_totals();
        if let Err(err) = write_json(self.storage.as_ref(), CART_KEY, &*cart).await {
            warn!("cart: failed to persist, keeping in-memory copy: {err:#}");
        }
        self.snapshots.publish(cart.clone());
    }
}

async fn load_cart(storage: &dyn KeyValueStore) -> Cart {
    match read_json::<Cart>(storage, CART_KEY).await {
        Ok(Some(mut cart)) => {
            cart.normalize();
            cart
        }
        Ok(None) => Cart::default(),
        Err(err) => {
            warn!("cart: stored cart is unreadable, starting empty: {err:#}");
            Cart::default()
        }
    }
}

#[cfg(test)]
#[path = "tests/cart_tests.rs"]
mod tests;
