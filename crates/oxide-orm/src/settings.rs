//! Install-wide settings.
//!
//! Settings live in the internal `[[*settings]]` table as text `data`/`value`
//! pairs. Their type comes from the default the caller passes, and a stored
//! value that does not parse reads as that default. The whole table is
//! loaded on first use and cached in the store.

use std::collections::HashMap;

use oxide_sql_core::schema::IndexDescriptor;
use oxide_sql_core::{Connection, FieldDescriptor, Insert, Select, TableDefinition, Update};
use tracing::debug;

use crate::error::Result;
use crate::fields::parse_bool;
use crate::store::Store;

/// Logical name of the settings table.
pub const SETTINGS_TABLE: &str = "*settings";

/// Definition of the settings table.
#[must_use]
pub fn settings_table() -> TableDefinition {
    TableDefinition::new(SETTINGS_TABLE)
        .field(FieldDescriptor::text("data").max_length(191))
        .field(FieldDescriptor::text("value").nullable())
        .unique(IndexDescriptor::new(["data"]))
}

/// A type a setting can take.
pub trait SettingValue: Clone + Send {
    /// What `min`/`max` constrain: the value itself for numbers, the
    /// character length for text.
    type Bound: Copy;

    /// Parses stored text.
    fn parse(raw: &str) -> Option<Self>;

    /// Stored text.
    fn to_stored(&self) -> String;

    /// Brings a parsed value into `[min, max]`, or falls back to `default`.
    #[must_use]
    fn fit(self, min: Option<Self::Bound>, max: Option<Self::Bound>, default: &Self) -> Self;
}

impl SettingValue for bool {
    type Bound = bool;

    fn parse(raw: &str) -> Option<Self> {
        Some(parse_bool(raw))
    }

    fn to_stored(&self) -> String {
        String::from(if *self { "1" } else { "0" })
    }

    fn fit(self, _: Option<bool>, _: Option<bool>, _: &Self) -> Self {
        self
    }
}

impl SettingValue for i64 {
    type Bound = Self;

    #[allow(clippy::cast_possible_truncation)]
    fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        raw.parse().ok().or_else(|| {
            raw.parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .map(|v| v as Self)
        })
    }

    fn to_stored(&self) -> String {
        self.to_string()
    }

    fn fit(self, min: Option<Self>, max: Option<Self>, _: &Self) -> Self {
        let lower = min.map_or(self, |m| self.max(m));
        max.map_or(lower, |m| lower.min(m))
    }
}

impl SettingValue for f64 {
    type Bound = Self;

    fn parse(raw: &str) -> Option<Self> {
        raw.trim().parse().ok().filter(|v: &Self| v.is_finite())
    }

    fn to_stored(&self) -> String {
        format!("{self:?}")
    }

    fn fit(self, min: Option<Self>, max: Option<Self>, _: &Self) -> Self {
        let lower = min.map_or(self, |m| self.max(m));
        max.map_or(lower, |m| lower.min(m))
    }
}

impl SettingValue for String {
    type Bound = usize;

    fn parse(raw: &str) -> Option<Self> {
        Some(Self::from(raw))
    }

    fn to_stored(&self) -> String {
        self.clone()
    }

    fn fit(self, min: Option<usize>, max: Option<usize>, default: &Self) -> Self {
        let length = self.chars().count();
        if min.is_some_and(|m| length < m) || max.is_some_and(|m| length > m) {
            default.clone()
        } else {
            self
        }
    }
}

impl<C: Connection> Store<C> {
    async fn load_settings(&mut self) -> Result<&mut HashMap<String, String>> {
        if self.settings.is_none() {
            let sql = Select::from(self.names().physical(SETTINGS_TABLE))
                .columns(["data", "value"])
                .render(self.dialect())?;
            let rows = self.fetch_recovering(&[settings_table()], &sql).await?;
            let loaded: HashMap<String, String> = rows
                .iter()
                .filter_map(|row| Some((row.text("data")?, row.text("value").unwrap_or_default())))
                .collect();
            debug!(count = loaded.len(), "Loaded settings");
            self.settings = Some(loaded);
        }
        Ok(self.settings.get_or_insert_with(HashMap::new))
    }

    async fn read_setting<T: SettingValue>(
        &mut self,
        name: &str,
        default: T,
        min: Option<T::Bound>,
        max: Option<T::Bound>,
        dynamic: bool,
    ) -> Result<T> {
        let stored = self.load_settings().await?.get(name).cloned();
        match stored {
            Some(raw) => Ok(T::parse(&raw).map_or_else(
                || default.clone(),
                |value| value.fit(min, max, &default),
            )),
            None if dynamic => Ok(default),
            None => {
                self.write_setting(name, default.to_stored(), false).await?;
                Ok(default)
            }
        }
    }

    async fn write_setting(&mut self, name: &str, raw: String, exists: bool) -> Result<()> {
        let table = self.names().physical(SETTINGS_TABLE);
        let sql = if exists {
            Update::table(table)
                .set("value", raw.as_str())
                .filter("data", name)
                .render(self.dialect())?
        } else {
            Insert::into(table)
                .value("data", name)
                .value("value", raw.as_str())
                .render(self.dialect())?
        };
        self.execute_recovering(&[settings_table()], &sql).await?;
        self.load_settings()
            .await?
            .insert(String::from(name), raw);
        Ok(())
    }

    /// Reads a setting, storing `default` on first read.
    ///
    /// # Errors
    ///
    /// Fails when the settings table cannot be read or written.
    pub async fn setting<T: SettingValue>(&mut self, name: &str, default: T) -> Result<T> {
        self.read_setting(name, default, None, None, false).await
    }

    /// Reads a bounded setting, storing `default` on first read.
    ///
    /// Numbers are clamped to `[min, max]`; text whose character length
    /// falls outside it reads as `default`.
    ///
    /// # Errors
    ///
    /// Fails when the settings table cannot be read or written.
    pub async fn setting_within<T: SettingValue>(
        &mut self,
        name: &str,
        default: T,
        min: T::Bound,
        max: T::Bound,
    ) -> Result<T> {
        self.read_setting(name, default, Some(min), Some(max), false)
            .await
    }

    /// Reads a setting without storing the default when it is absent.
    ///
    /// # Errors
    ///
    /// Fails when the settings table cannot be read.
    pub async fn dynamic_setting<T: SettingValue>(&mut self, name: &str, default: T) -> Result<T> {
        self.read_setting(name, default, None, None, true).await
    }

    /// Stores a setting.
    ///
    /// # Errors
    ///
    /// Fails when the settings table cannot be written.
    pub async fn set_setting<T: SettingValue>(&mut self, name: &str, value: &T) -> Result<()> {
        let exists = self.load_settings().await?.contains_key(name);
        self.write_setting(name, value.to_stored(), exists).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!(i64::parse(" 42 "), Some(42));
        assert_eq!(i64::parse("2.9"), Some(2));
        assert_eq!(i64::parse("many"), None);
        assert_eq!(f64::parse("0.5"), Some(0.5));
        assert_eq!(f64::parse("NaN"), None);
        assert_eq!(bool::parse("Disabled"), Some(false));
        assert_eq!(bool::parse("on"), Some(true));
    }

    #[test]
    fn test_fit() {
        assert_eq!(3_i64.fit(Some(5), None, &100), 5);
        assert_eq!(700_i64.fit(Some(5), Some(500), &100), 500);
        assert!((1.5_f64.fit(None, Some(1.0), &0.0) - 1.0).abs() < f64::EPSILON);
        assert_eq!(
            String::from("ab").fit(Some(3), None, &String::from("default")),
            "default"
        );
        assert_eq!(String::from("abc").fit(Some(3), Some(3), &String::new()), "abc");
    }

    #[test]
    fn test_to_stored() {
        assert_eq!(true.to_stored(), "1");
        assert_eq!(1.0_f64.to_stored(), "1.0");
        assert_eq!(i64::parse(&7_i64.to_stored()), Some(7));
    }
}
