//! Ordered record collections and the rules which apply to whole sets of
//! records (single PI, single primary address, weighted ratings, ...)

use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, HashSet};

use super::enums::{GroupType, ReviewerRole, RoleCatalog};
use super::jcmt::{JcmtInstrument, JcmtWeather};
use super::records::{Email, GroupMember, JcmtAvailable, JcmtRequest, Member, Reviewer, Target};
use crate::{Error, Result};

/// Insertion-ordered map of records by key.
///
/// Collections read from the database are keyed by record identifier.
/// Collections built from input may use any keys: only the records' own
/// `id` fields matter when they are written back.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultCollection<T> {
    entries: Vec<(i64, T)>,
}

impl<T> Default for ResultCollection<T> {
    fn default() -> Self {
        Self { entries: Vec::new() }
    }
}

impl<T> ResultCollection<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a collection keyed by position
    pub fn from_values(values: impl IntoIterator<Item = T>) -> Self {
        values
            .into_iter()
            .enumerate()
            .map(|(i, v)| (i as i64, v))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert or replace, keeping the original position on replacement
    pub fn insert(&mut self, key: i64, value: T) -> Option<T> {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => Some(std::mem::replace(existing, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    pub fn get(&self, key: i64) -> Option<&T> {
        self.entries.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, key: i64) -> Option<&mut T> {
        self.entries.iter_mut().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    pub fn remove(&mut self, key: i64) -> Option<T> {
        let pos = self.entries.iter().position(|(k, _)| *k == key)?;
        Some(self.entries.remove(pos).1)
    }

    pub fn contains_key(&self, key: i64) -> bool {
        self.get(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = i64> + '_ {
        self.entries.iter().map(|(k, _)| *k)
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().map(|(_, v)| v)
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.entries.iter_mut().map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (i64, &T)> {
        self.entries.iter().map(|(k, v)| (*k, v))
    }

    pub fn into_values(self) -> Vec<T> {
        self.entries.into_iter().map(|(_, v)| v).collect()
    }

    /// The only record of the collection
    pub fn get_single(&self) -> Result<&T> {
        self.get_single_opt()?
            .ok_or_else(|| Error::NoSuchRecord("can not get single record: no results".to_string()))
    }

    /// Like `get_single` but an empty collection gives `default`
    pub fn get_single_or<'a>(&'a self, default: &'a T) -> Result<&'a T> {
        Ok(self.get_single_opt()?.unwrap_or(default))
    }

    /// Like `get_single` but an empty collection gives `None`
    pub fn get_single_opt(&self) -> Result<Option<&T>> {
        match self.entries.len() {
            0 => Ok(None),
            1 => Ok(Some(&self.entries[0].1)),
            _ => Err(Error::MultipleRecords(
                "can not get single record: many results".to_string(),
            )),
        }
    }
}

impl<T> FromIterator<(i64, T)> for ResultCollection<T> {
    fn from_iter<I: IntoIterator<Item = (i64, T)>>(iter: I) -> Self {
        let mut collection = Self::new();
        for (k, v) in iter {
            collection.insert(k, v);
        }
        collection
    }
}

impl<T: Serialize> Serialize for ResultCollection<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_seq(self.values())
    }
}

/// Records with a display position
pub trait SortOrdered {
    fn sort_order(&self) -> Option<i64>;
    fn set_sort_order(&mut self, sort_order: i64);
}

impl<T: SortOrdered> ResultCollection<T> {
    /// Give every record a sort order.
    ///
    /// Records without one are numbered after the largest existing value,
    /// in collection order.
    pub fn ensure_sort_order(&mut self) {
        let mut next = self
            .values()
            .filter_map(|value| value.sort_order())
            .fold(0, i64::max);

        for value in self.values_mut() {
            if value.sort_order().is_none() {
                next += 1;
                value.set_sort_order(next);
            }
        }
    }
}

impl SortOrdered for Member {
    fn sort_order(&self) -> Option<i64> {
        self.sort_order
    }

    fn set_sort_order(&mut self, sort_order: i64) {
        self.sort_order = Some(sort_order);
    }
}

impl SortOrdered for Target {
    fn sort_order(&self) -> Option<i64> {
        self.sort_order
    }

    fn set_sort_order(&mut self, sort_order: i64) {
        self.sort_order = Some(sort_order);
    }
}

pub type EmailCollection = ResultCollection<Email>;
pub type MemberCollection = ResultCollection<Member>;
pub type TargetCollection = ResultCollection<Target>;
pub type GroupMemberCollection = ResultCollection<GroupMember>;
pub type ReviewerCollection = ResultCollection<Reviewer>;
pub type JcmtRequestCollection = ResultCollection<JcmtRequest>;
pub type JcmtAvailableCollection = ResultCollection<JcmtAvailable>;

impl ResultCollection<Email> {
    pub fn get_primary(&self) -> Option<&Email> {
        self.values().find(|email| email.primary)
    }

    /// Exactly one primary address and no repeated addresses
    pub fn validate(&self) -> Result<()> {
        let mut n_primary = 0;
        let mut seen = HashSet::new();

        for email in self.values() {
            if email.primary {
                n_primary += 1;
            }

            if !seen.insert(email.address.as_str()) {
                return Err(Error::user(format!(
                    "The address \"{}\" appears more than once.",
                    email.address
                )));
            }
        }

        match n_primary {
            0 => Err(Error::user("There is no primary address.")),
            1 => Ok(()),
            _ => Err(Error::user("There is more than one primary address.")),
        }
    }
}

impl ResultCollection<Member> {
    pub fn get_pi(&self) -> Option<&Member> {
        self.values().find(|member| member.pi)
    }

    pub fn get_person(&self, person_id: i64) -> Option<&Member> {
        self.values().find(|member| member.person_id == person_id)
    }

    pub fn get_students(&self) -> Vec<&Member> {
        self.values().filter(|member| member.student).collect()
    }

    /// Check the member list of a proposal.
    ///
    /// There must be exactly one PI and at least one editor. When
    /// `editor_person_id` is given, that person must remain a member and an
    /// editor, so nobody can lock themselves out of a proposal.
    pub fn validate(&self, editor_person_id: Option<i64>) -> Result<()> {
        let mut n_pi = 0;
        let mut n_editor = 0;
        let mut person_is_editor = None;

        for member in self.values() {
            if member.pi {
                n_pi += 1;
            }
            if member.editor {
                n_editor += 1;
            }
            if Some(member.person_id) == editor_person_id {
                person_is_editor = Some(member.editor);
            }
        }

        match n_pi {
            0 => return Err(Error::user("There is no PI specified.")),
            1 => {}
            _ => return Err(Error::user("There is more than one PI specified.")),
        }

        if n_editor == 0 {
            return Err(Error::user("There are no specified editors."));
        }

        if editor_person_id.is_some() {
            match person_is_editor {
                None => return Err(Error::user("You can not remove yourself from the proposal.")),
                Some(false) => return Err(Error::user("You can not remove yourself as an editor.")),
                Some(true) => {}
            }
        }

        Ok(())
    }
}

impl ResultCollection<Target> {
    pub fn validate(&self) -> Result<()> {
        for target in self.values() {
            if target.name.trim().is_empty() {
                return Err(Error::user("Each target object should have a name."));
            }

            match (target.x, target.y) {
                (Some(_), Some(_)) => {
                    if target.system.is_none() {
                        return Err(Error::user(format!(
                            "Target \"{}\" has no coordinate system.",
                            target.name
                        )));
                    }
                }
                (None, None) => {}
                _ => {
                    return Err(Error::user(format!(
                        "Target \"{}\" has only one coordinate.",
                        target.name
                    )))
                }
            }

            if let Some(time) = target.time {
                if !time.is_finite() || time < 0.0 {
                    return Err(Error::user(format!(
                        "Could not parse time for \"{}\".",
                        target.name
                    )));
                }
            }
        }

        Ok(())
    }

    /// Sum of the defined target times (0.0 when none are defined)
    pub fn total_time(&self) -> f64 {
        self.values().filter_map(|t| t.time).sum()
    }

    /// Targets with both coordinates defined
    pub fn with_coordinates(&self) -> Vec<&Target> {
        self.values().filter(|t| t.x.is_some() && t.y.is_some()).collect()
    }
}

impl ResultCollection<GroupMember> {
    pub fn values_by_group_type(&self, group_type: GroupType) -> Vec<&GroupMember> {
        self.values().filter(|m| m.group_type == group_type).collect()
    }
}

impl ResultCollection<Reviewer> {
    /// Ratings of completed reviews with the weight each one carries.
    ///
    /// Roles with explicit weights use `review_weight / 100`; other rating
    /// roles count at full weight, or not at all when `include_unweighted`
    /// is false.
    fn weighted_ratings(&self, roles: &dyn RoleCatalog, include_unweighted: bool) -> Vec<(f64, f64)> {
        let mut ratings = Vec::new();

        for review in self.values() {
            let role_info = roles.role_info(review.role);

            if !(include_unweighted || role_info.weight) {
                continue;
            }

            if !review.review_present || !role_info.rating {
                continue;
            }
            let Some(rating) = review.review_rating else {
                continue;
            };

            let weight = if role_info.weight {
                match review.review_weight {
                    Some(weight) => weight as f64 / 100.0,
                    None => continue,
                }
            } else {
                1.0
            };

            ratings.push((rating as f64, weight));
        }

        ratings
    }

    /// Weighted mean of the ratings of completed reviews
    pub fn overall_rating(&self, roles: &dyn RoleCatalog, include_unweighted: bool) -> Option<f64> {
        let ratings = self.weighted_ratings(roles, include_unweighted);
        weighted_mean(&ratings)
    }

    /// Weighted mean and weighted standard deviation
    pub fn overall_rating_with_std_dev(
        &self,
        roles: &dyn RoleCatalog,
        include_unweighted: bool,
    ) -> Option<(f64, f64)> {
        let ratings = self.weighted_ratings(roles, include_unweighted);
        let mean = weighted_mean(&ratings)?;

        let total_weight: f64 = ratings.iter().map(|(_, w)| w).sum();
        let total_dev: f64 = ratings
            .iter()
            .map(|(rating, weight)| weight * (rating - mean).powi(2))
            .sum();

        Some((mean, (total_dev / total_weight).sqrt()))
    }

    pub fn get_person(&self, person_id: i64, roles: Option<&[ReviewerRole]>) -> Option<&Reviewer> {
        self.values().find(|r| {
            r.person_id == person_id && roles.map_or(true, |roles| roles.contains(&r.role))
        })
    }

    pub fn person_ids_by_role(&self, role: ReviewerRole) -> Vec<i64> {
        self.values().filter(|r| r.role == role).map(|r| r.person_id).collect()
    }

    pub fn values_by_role(&self, role: ReviewerRole) -> Vec<&Reviewer> {
        self.values().filter(|r| r.role == role).collect()
    }

    /// Reviewers grouped by role, in role order.
    ///
    /// `cttee` restricts the result to committee roles (`Some(true)`) or
    /// non-committee roles (`Some(false)`).
    pub fn values_in_role_order(&self, roles: &dyn RoleCatalog, cttee: Option<bool>) -> Vec<&Reviewer> {
        ReviewerRole::ALL
            .into_iter()
            .filter(|role| cttee.map_or(true, |c| roles.role_info(*role).cttee == c))
            .flat_map(|role| self.values().filter(move |r| r.role == role))
            .collect()
    }
}

fn weighted_mean(ratings: &[(f64, f64)]) -> Option<f64> {
    let total_weight: f64 = ratings.iter().map(|(_, w)| w).sum();
    if total_weight == 0.0 {
        return None;
    }

    let total_rating: f64 = ratings.iter().map(|(r, w)| r * w).sum();
    Some(total_rating / total_weight)
}

/// Totals of a set of JCMT requests, allocations or availabilities.
///
/// Time in unavailable bands or on unavailable instruments is gathered
/// under key 0.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JcmtRequestTotal {
    pub total: f64,
    pub weather: BTreeMap<i64, f64>,
    pub instrument: BTreeMap<i64, f64>,
    pub total_non_free: f64,
}

/// Requests arranged by instrument and weather band.
///
/// Key 0 holds totals: per instrument in each row, and a totals row by band
/// when there is more than one instrument.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JcmtRequestTable {
    pub table: BTreeMap<i64, BTreeMap<i64, f64>>,
    /// Bands which are available or present in the table
    pub weathers: Vec<(i64, &'static str)>,
    /// Instruments present in the table
    pub instruments: Vec<(i64, &'static str)>,
}

fn weather_name(code: i64) -> Result<&'static str> {
    JcmtWeather::from_code(code)
        .map(JcmtWeather::name)
        .ok_or_else(|| Error::user("Weather band not recognised."))
}

impl ResultCollection<JcmtAvailable> {
    pub fn validate(&self) -> Result<()> {
        let mut weathers = HashSet::new();

        for record in self.values() {
            let name = weather_name(record.weather)?;

            if !record.time.is_finite() || record.time < 0.0 {
                return Err(Error::user(format!(
                    "Please enter time as a valid number for {}",
                    name
                )));
            }

            if !weathers.insert(record.weather) {
                return Err(Error::user(format!("There are multiple entries for {}", name)));
            }
        }

        Ok(())
    }

    pub fn get_total(&self) -> JcmtRequestTotal {
        let mut totals = JcmtRequestTotal::default();

        for record in self.values() {
            let info = JcmtWeather::from_code(record.weather).map(JcmtWeather::info);
            let weather = match info {
                Some(info) if info.available => record.weather,
                _ => 0,
            };

            totals.total += record.time;
            *totals.weather.entry(weather).or_insert(0.0) += record.time;

            if !info.map_or(false, |info| info.free) {
                totals.total_non_free += record.time;
            }
        }

        totals
    }
}

impl ResultCollection<JcmtRequest> {
    pub fn validate(&self) -> Result<()> {
        let mut requests = HashSet::new();

        for record in self.values() {
            let instrument = JcmtInstrument::from_code(record.instrument)
                .ok_or_else(|| Error::user("Instrument not recognised."))?;
            let weather = weather_name(record.weather)?;

            if !record.time.is_finite() || record.time < 0.0 {
                return Err(Error::user(format!(
                    "Please enter time as a valid number for {}, {}",
                    instrument.name(),
                    weather
                )));
            }

            if !requests.insert((record.instrument, record.weather)) {
                return Err(Error::user(format!(
                    "There are multiple entries for {}, {}",
                    instrument.name(),
                    weather
                )));
            }
        }

        Ok(())
    }

    pub fn to_table(&self) -> JcmtRequestTable {
        let mut present_weathers = HashSet::new();
        let mut table: BTreeMap<i64, BTreeMap<i64, f64>> = BTreeMap::new();
        let mut band_totals: BTreeMap<i64, f64> = BTreeMap::new();

        for request in self.values() {
            present_weathers.insert(request.weather);

            let row = table.entry(request.instrument).or_default();
            *row.entry(request.weather).or_insert(0.0) += request.time;
            *row.entry(0).or_insert(0.0) += request.time;

            *band_totals.entry(request.weather).or_insert(0.0) += request.time;
        }

        let instruments = JcmtInstrument::ALL
            .into_iter()
            .filter(|i| table.contains_key(&i.code()))
            .map(|i| (i.code(), i.name()))
            .collect();

        if table.len() > 1 {
            let grand_total = band_totals.values().sum();
            band_totals.insert(0, grand_total);
            table.insert(0, band_totals);
        }

        let weathers = JcmtWeather::ALL
            .into_iter()
            .filter(|w| w.info().available || present_weathers.contains(&w.code()))
            .map(|w| (w.code(), w.name()))
            .collect();

        JcmtRequestTable { table, weathers, instruments }
    }

    pub fn get_total(&self) -> JcmtRequestTotal {
        let mut totals = JcmtRequestTotal::default();

        for request in self.values() {
            let info = JcmtWeather::from_code(request.weather).map(JcmtWeather::info);
            let weather = match info {
                Some(info) if info.available => request.weather,
                _ => 0,
            };
            let instrument = match JcmtInstrument::from_code(request.instrument) {
                Some(i) if i.available() => request.instrument,
                _ => 0,
            };

            totals.total += request.time;
            *totals.weather.entry(weather).or_insert(0.0) += request.time;
            *totals.instrument.entry(instrument).or_insert(0.0) += request.time;

            if !info.map_or(false, |info| info.free) {
                totals.total_non_free += request.time;
            }
        }

        totals
    }
}
