use std::collections::HashSet;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::geo::GeoPoint;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

id_newtype!(ProductId);
id_newtype!(UserId);

/// A purchasable menu entry. Only `id` and `price` matter to the cart; the
/// remaining fields ride along so a persisted cart can be rendered offline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    #[serde(default)]
    pub name: String,
    pub price: Decimal,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl Product {
    pub fn new(id: impl Into<String>, name: impl Into<String>, price: Decimal) -> Self {
        Self {
            id: ProductId::new(id),
            name: name.into(),
            price,
            tags: Vec::new(),
            image_url: None,
        }
    }
}

/// One product-and-quantity entry. `price` is the line amount, always
/// `quantity * product.price`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
    #[serde(rename = "food")]
    pub product: Product,
    pub quantity: u32,
    pub price: Decimal,
}

impl CartLine {
    pub fn new(product: Product) -> Self {
        let price = product.price;
        Self {
            product,
            quantity: 1,
            price,
        }
    }

    /// Quantities below one are raised to one; removal goes through
    /// [`Cart::remove`]. A quantity whose amount does not fit a `Decimal` is
    /// rejected and the line keeps its previous state.
    pub fn set_quantity(&mut self, quantity: u32) -> bool {
        let quantity = quantity.max(1);
        let Some(price) = line_amount(&self.product, quantity) else {
            return false;
        };
        self.quantity = quantity;
        self.price = price;
        true
    }
}

fn line_amount(product: &Product, quantity: u32) -> Option<Decimal> {
    product.price.checked_mul(Decimal::from(quantity))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    #[serde(default)]
    pub items: Vec<CartLine>,
    #[serde(default)]
    pub total_price: Decimal,
    #[serde(default)]
    pub total_count: u64,
}

impl Cart {
    pub fn line(&self, product_id: &ProductId) -> Option<&CartLine> {
        self.items.iter().find(|line| &line.product.id == product_id)
    }

    pub fn contains(&self, product_id: &ProductId) -> bool {
        self.line(product_id).is_some()
    }

    /// Appends a line for `product` unless one already exists. Returns whether
    /// a line was added.
    pub fn add(&mut self, product: Product) -> bool {
        if self.contains(&product.id) {
            return false;
        }
        self.items.push(CartLine::new(product));
        true
    }

    pub fn remove(&mut self, product_id: &ProductId) -> bool {
        let before = self.items.len();
        self.items.retain(|line| &line.product.id != product_id);
        self.items.len() != before
    }

    /// Returns whether the line changed. Absent products and quantities that
    /// would overflow the cart total leave the cart untouched.
    pub fn set_quantity(&mut self, product_id: &ProductId, quantity: u32) -> bool {
        let Some(index) = self
            .items
            .iter()
            .position(|line| &line.product.id == product_id)
        else {
            return false;
        };
        let mut line = self.items[index].clone();
        if !line.set_quantity(quantity) {
            return false;
        }
        let others = self
            .items
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != index)
            .try_fold(line.price, |total, (_, other)| total.checked_add(other.price));
        if others.is_none() {
            return false;
        }
        self.items[index] = line;
        true
    }

    /// Repairs a cart read back from storage: keeps the first line per
    /// product, floors quantities to one and recomputes every line amount.
    pub fn normalize(&mut self) {
        let mut seen = HashSet::new();
        self.items.retain(|line| seen.insert(line.product.id.clone()));
        for line in &mut self.items {
            if !line.set_quantity(line.quantity) {
                line.quantity = 1;
                line.price = line.product.price;
            }
        }
        self.recompute_totals();
    }

    pub fn recompute_totals(&mut self) {
        self.total_price = self
            .items
            .iter()
            .fold(Decimal::ZERO, |total, line| total.saturating_add(line.price));
        self.total_count = self
            .items
            .iter()
            .map(|line| u64::from(line.quantity))
            .sum();
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub address: String,
    pub token: String,
    #[serde(default)]
    pub is_admin: bool,
}

/// The live identity of this client. `Anonymous` is what every failed or
/// missing load resolves to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Session {
    #[default]
    Anonymous,
    Authenticated(User),
}

impl Session {
    pub fn user(&self) -> Option<&User> {
        match self {
            Self::Anonymous => None,
            Self::Authenticated(user) => Some(user),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_lat_lng: Option<GeoPoint>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pizza() -> Product {
        Product::new("1", "Pizza Pepperoni", Decimal::new(1000, 2))
    }

    fn meatball() -> Product {
        Product::new("2", "Meatball", Decimal::new(2050, 2))
    }

    #[test]
    fn adding_same_product_twice_keeps_single_line() {
        let mut cart = Cart::default();
        assert!(cart.add(pizza()));
        assert!(!cart.add(pizza()));
        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.items[0].quantity, 1);
    }

    #[test]
    fn totals_follow_lines() {
        let mut cart = Cart::default();
        cart.add(pizza());
        cart.add(meatball());
        cart.set_quantity(&ProductId::new("2"), 3);
        cart.recompute_totals();

        assert_eq!(cart.total_count, 4);
        assert_eq!(cart.total_price, Decimal::new(7150, 2));
        assert_eq!(cart.items[1].price, Decimal::new(6150, 2));
    }

    #[test]
    fn set_quantity_on_missing_line_is_ignored() {
        let mut cart = Cart::default();
        cart.add(pizza());
        assert!(!cart.set_quantity(&ProductId::new("404"), 5));
        assert_eq!(cart.items[0].quantity, 1);
    }

    #[test]
    fn zero_quantity_is_floored_to_one() {
        let mut cart = Cart::default();
        cart.add(meatball());
        cart.set_quantity(&ProductId::new("2"), 0);
        assert_eq!(cart.items[0].quantity, 1);
        assert_eq!(cart.items[0].price, Decimal::new(2050, 2));
    }

    #[test]
    fn overflowing_quantity_leaves_line_unchanged() {
        let mut cart = Cart::default();
        cart.add(Product::new("9", "Gold", Decimal::MAX));
        cart.add(pizza());

        assert!(!cart.set_quantity(&ProductId::new("9"), 2));
        assert!(!cart.set_quantity(&ProductId::new("1"), 2));
        assert_eq!(cart.items[0].quantity, 1);
        assert_eq!(cart.items[1].quantity, 1);
    }

    #[test]
    fn normalize_drops_duplicates_and_recomputes_amounts() {
        let mut cart = Cart::default();
        cart.items.push(CartLine {
            product: pizza(),
            quantity: 2,
            price: Decimal::from(999),
        });
        cart.items.push(CartLine::new(pizza()));
        cart.items.push(CartLine {
            product: meatball(),
            quantity: 0,
            price: Decimal::ZERO,
        });

        cart.normalize();

        assert_eq!(cart.items.len(), 2);
        assert_eq!(cart.items[0].price, Decimal::new(2000, 2));
        assert_eq!(cart.items[1].quantity, 1);
        assert_eq!(cart.total_price, Decimal::new(4050, 2));
        assert_eq!(cart.total_count, 3);
    }

    #[test]
    fn stored_cart_without_items_decodes_as_empty() {
        let cart: Cart = serde_json::from_str(r#"{"totalPrice":"0","totalCount":0}"#)
            .expect("decode");
        assert!(cart.items.is_empty());
    }

    #[test]
    fn cart_line_uses_browser_field_names() {
        let mut cart = Cart::default();
        cart.add(pizza());
        cart.recompute_totals();
        let json = serde_json::to_value(&cart).expect("encode");
        assert!(json["items"][0]["food"]["id"].is_string());
        assert_eq!(json["totalCount"], 1);
    }

    #[test]
    fn session_user_accessor() {
        assert!(Session::Anonymous.user().is_none());
        let user = User {
            id: UserId::new("u1"),
            email: "john@gmail.com".into(),
            name: "John".into(),
            address: String::new(),
            token: "t".into(),
            is_admin: false,
        };
        assert_eq!(
            Session::Authenticated(user.clone()).user(),
            Some(&user)
        );
    }
}
