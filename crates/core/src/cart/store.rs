//! Cart Persistence

use std::{
    fmt, fs, io,
    path::{Path, PathBuf},
    sync::{Mutex, PoisonError},
};

use rusty_money::iso::{self, Currency};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cart::{Cart, CartItem};

/// Errors raised while loading or saving a cart.
#[derive(Debug, Error)]
pub enum CartStoreError {
    /// The underlying file could not be read or written.
    #[error("cart storage io error")]
    Io(#[from] io::Error),

    /// The stored cart could not be encoded or decoded.
    #[error("cart storage encoding error")]
    Encoding(#[from] serde_json::Error),

    /// The stored currency code is not a known ISO currency.
    #[error("unknown currency \"{0}\"")]
    UnknownCurrency(String),

    /// A previous holder of the store panicked.
    #[error("cart store lock poisoned")]
    Poisoned,
}

impl<T> From<PoisonError<T>> for CartStoreError {
    fn from(_error: PoisonError<T>) -> Self {
        Self::Poisoned
    }
}

/// Serialized form of a cart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartSnapshot {
    /// ISO 4217 alpha code.
    pub currency: String,

    /// Cart lines.
    pub items: Vec<CartItem>,
}

impl From<&Cart> for CartSnapshot {
    fn from(cart: &Cart) -> Self {
        Self {
            currency: cart.currency().iso_alpha_code.to_string(),
            items: cart.items().to_vec(),
        }
    }
}

impl TryFrom<CartSnapshot> for Cart {
    type Error = CartStoreError;

    fn try_from(snapshot: CartSnapshot) -> Result<Self, Self::Error> {
        let currency = iso::find(&snapshot.currency)
            .ok_or(CartStoreError::UnknownCurrency(snapshot.currency))?;

        Ok(Cart::with_items(snapshot.items, currency))
    }
}

/// Somewhere a cart can be kept between sessions.
pub trait CartStore {
    /// Load the stored cart, or an empty cart in `currency` if nothing is stored.
    ///
    /// # Errors
    ///
    /// Returns an error if stored data exists but cannot be read.
    fn load(&self, currency: &'static Currency) -> Result<Cart, CartStoreError>;

    /// Replace the stored cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the cart cannot be written.
    fn save(&self, cart: &Cart) -> Result<(), CartStoreError>;

    /// Forget the stored cart.
    ///
    /// # Errors
    ///
    /// Returns an error if stored data cannot be removed.
    fn clear(&self) -> Result<(), CartStoreError>;
}

/// In-memory cart store.
#[derive(Debug, Default)]
pub struct MemoryCartStore {
    snapshot: Mutex<Option<CartSnapshot>>,
}

impl CartStore for MemoryCartStore {
    fn load(&self, currency: &'static Currency) -> Result<Cart, CartStoreError> {
        match self.snapshot.lock()?.clone() {
            Some(snapshot) => Cart::try_from(snapshot),
            None => Ok(Cart::new(currency)),
        }
    }

    fn save(&self, cart: &Cart) -> Result<(), CartStoreError> {
        *self.snapshot.lock()? = Some(CartSnapshot::from(cart));

        Ok(())
    }

    fn clear(&self) -> Result<(), CartStoreError> {
        *self.snapshot.lock()? = None;

        Ok(())
    }
}

/// Cart store backed by a JSON file.
pub struct JsonFileCartStore {
    path: PathBuf,
}

impl JsonFileCartStore {
    /// Create a store that reads and writes `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl fmt::Debug for JsonFileCartStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("JsonFileCartStore")
            .field(&self.path.display())
            .finish()
    }
}

impl CartStore for JsonFileCartStore {
    fn load(&self, currency: &'static Currency) -> Result<Cart, CartStoreError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                return Ok(Cart::new(currency));
            }
            Err(error) => return Err(error.into()),
        };

        let snapshot: CartSnapshot = serde_json::from_str(&contents)?;

        Cart::try_from(snapshot)
    }

    fn save(&self, cart: &Cart) -> Result<(), CartStoreError> {
        let contents = serde_json::to_string_pretty(&CartSnapshot::from(cart))?;

        fs::write(&self.path, contents)?;

        Ok(())
    }

    fn clear(&self) -> Result<(), CartStoreError> {
        match fs::remove_file(&self.path) {
            Err(error) if error.kind() != io::ErrorKind::NotFound => Err(error.into()),
            _ => Ok(()),
        }
    }
}
