//! Caller-owned job repository.
//!
//! Jobs live in an arena indexed by [`JobId`], passed by reference into the
//! pure pipeline functions — no pipeline stage retains a job. All editing
//! goes through the store so two rules hold everywhere:
//!
//! - the time/value invariant: an entry's `time` is non-empty iff one of its
//!   values is non-empty (the first value written stamps the clock, clearing
//!   both values clears the stamp);
//! - any edit to a job in the `Error` state re-arms it to `Idle`, making it
//!   submittable again.

use crate::types::{Entry, Job, Photo, SubmissionStatus};
use chrono::Local;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("no job with id {0:?}")]
    UnknownJob(JobId),
    #[error("no entry with id {entry} in job {job:?}")]
    UnknownEntry { job: JobId, entry: u32 },
}

/// Arena index of one job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobId(pub u32);

/// Arena of jobs plus the editing operations that keep them consistent.
#[derive(Debug, Default)]
pub struct JobStore {
    jobs: Vec<Job>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, job: Job) -> JobId {
        self.jobs.push(job);
        JobId(self.jobs.len() as u32 - 1)
    }

    pub fn get(&self, id: JobId) -> Result<&Job, StoreError> {
        self.jobs.get(id.0 as usize).ok_or(StoreError::UnknownJob(id))
    }

    /// Mutable access for the pipeline's status transitions. Edits made this
    /// way bypass the re-arm rule on purpose.
    pub(crate) fn get_mut(&mut self, id: JobId) -> Result<&mut Job, StoreError> {
        self.jobs
            .get_mut(id.0 as usize)
            .ok_or(StoreError::UnknownJob(id))
    }

    /// Append an empty entry row and return its id.
    pub fn add_entry(&mut self, id: JobId) -> Result<u32, StoreError> {
        let job = self.edit(id)?;
        let entry_id = job.entries.iter().map(|e| e.id).max().unwrap_or(0) + 1;
        job.entries.push(Entry {
            id: entry_id,
            ..Entry::default()
        });
        Ok(entry_id)
    }

    /// Set an entry's primary value, maintaining the time stamp.
    pub fn set_value(&mut self, id: JobId, entry_id: u32, value: &str) -> Result<(), StoreError> {
        let entry = self.edit_entry(id, entry_id)?;
        entry.value = value.to_string();
        reconcile_time(entry);
        Ok(())
    }

    /// Set an entry's secondary value (dual-mode items), maintaining the time
    /// stamp. The secondary channel shares the primary's timestamp; it never
    /// carries its own.
    pub fn set_value_secondary(
        &mut self,
        id: JobId,
        entry_id: u32,
        value: &str,
    ) -> Result<(), StoreError> {
        let entry = self.edit_entry(id, entry_id)?;
        entry.value_secondary = value.to_string();
        reconcile_time(entry);
        Ok(())
    }

    pub fn set_identifier(
        &mut self,
        id: JobId,
        entry_id: u32,
        identifier: &str,
    ) -> Result<(), StoreError> {
        let entry = self.edit_entry(id, entry_id)?;
        entry.identifier = identifier.to_string();
        Ok(())
    }

    /// Blur formatting: fix both channels of an entry to the job's configured
    /// decimal places. Called when the operator leaves the field.
    pub fn format_entry(&mut self, id: JobId, entry_id: u32) -> Result<(), StoreError> {
        let job = self.edit(id)?;
        let places = job.decimal_places;
        let places_secondary = job.decimal_places_secondary.unwrap_or(places);
        let entry = find_entry(job, entry_id).ok_or(StoreError::UnknownEntry {
            job: id,
            entry: entry_id,
        })?;
        entry.value = format_value(&entry.value, places);
        entry.value_secondary = format_value(&entry.value_secondary, places_secondary);
        Ok(())
    }

    /// Attach a photo unless an identical `(name, size)` capture is already
    /// present. Returns whether the photo was added.
    pub fn add_photo(&mut self, id: JobId, photo: Photo) -> Result<bool, StoreError> {
        let job = self.edit(id)?;
        let duplicate = job
            .photos
            .iter()
            .any(|p| p.file_name == photo.file_name && p.bytes.len() == photo.bytes.len());
        if duplicate {
            return Ok(false);
        }
        job.photos.push(photo);
        Ok(true)
    }

    /// Editing access: re-arms an errored job before handing out the borrow.
    fn edit(&mut self, id: JobId) -> Result<&mut Job, StoreError> {
        let job = self.get_mut(id)?;
        if job.status == SubmissionStatus::Error {
            job.status = SubmissionStatus::Idle;
            job.status_message.clear();
        }
        Ok(job)
    }

    fn edit_entry(&mut self, id: JobId, entry_id: u32) -> Result<&mut Entry, StoreError> {
        let job = self.edit(id)?;
        find_entry(job, entry_id).ok_or(StoreError::UnknownEntry {
            job: id,
            entry: entry_id,
        })
    }
}

fn find_entry(job: &mut Job, entry_id: u32) -> Option<&mut Entry> {
    job.entries.iter_mut().find(|e| e.id == entry_id)
}

/// Keep `time` in step with the values: stamp it when the first value arrives,
/// clear it when both values are gone, leave it alone otherwise.
fn reconcile_time(entry: &mut Entry) {
    if entry.is_empty() {
        entry.time.clear();
    } else if entry.time.is_empty() {
        entry.time = Local::now().format("%H:%M:%S").to_string();
    }
}

/// Fix a numeric string to `places` decimals; non-numeric input passes through
/// unchanged. Idempotent: formatting an already-formatted value is a no-op.
pub fn format_value(value: &str, places: u8) -> String {
    if value.is_empty() {
        return String::new();
    }
    match value.trim().parse::<f64>() {
        Ok(number) => format!("{:.*}", places as usize, number),
        Err(_) => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_job() -> (JobStore, JobId) {
        let mut store = JobStore::new();
        let id = store.add(Job {
            receipt_number: "R1".into(),
            site_location: "Bay 3".into(),
            selected_item: "A/B".into(),
            decimal_places: 2,
            ..Job::default()
        });
        (store, id)
    }

    #[test]
    fn format_value_fixes_decimal_places() {
        assert_eq!(format_value("1.2345", 2), "1.23");
        assert_eq!(format_value("10", 2), "10.00");
        assert_eq!(format_value("-0.5", 3), "-0.500");
    }

    #[test]
    fn format_value_is_idempotent() {
        for (value, places) in [("1.2345", 2), ("10", 0), ("-3.14159", 4), ("0.1", 1)] {
            let once = format_value(value, places);
            assert_eq!(format_value(&once, places), once);
        }
    }

    #[test]
    fn format_value_passes_free_text_through() {
        assert_eq!(format_value("pending", 2), "pending");
        assert_eq!(format_value("", 2), "");
    }

    #[test]
    fn first_value_stamps_time() {
        let (mut store, id) = store_with_job();
        let entry = store.add_entry(id).unwrap();

        assert!(store.get(id).unwrap().entries[0].time.is_empty());
        store.set_value(id, entry, "1.23").unwrap();
        assert!(!store.get(id).unwrap().entries[0].time.is_empty());
    }

    #[test]
    fn clearing_both_values_clears_time() {
        let (mut store, id) = store_with_job();
        let entry = store.add_entry(id).unwrap();
        store.set_value(id, entry, "1.23").unwrap();
        store.set_value_secondary(id, entry, "0.5").unwrap();

        store.set_value(id, entry, "").unwrap();
        assert!(!store.get(id).unwrap().entries[0].time.is_empty());

        store.set_value_secondary(id, entry, "").unwrap();
        assert!(store.get(id).unwrap().entries[0].time.is_empty());
    }

    #[test]
    fn secondary_value_shares_primary_timestamp() {
        let (mut store, id) = store_with_job();
        let entry = store.add_entry(id).unwrap();
        store.set_value(id, entry, "10").unwrap();
        let stamped = store.get(id).unwrap().entries[0].time.clone();

        store.set_value_secondary(id, entry, "0.5").unwrap();
        assert_eq!(store.get(id).unwrap().entries[0].time, stamped);
    }

    #[test]
    fn blur_formatting_applies_job_decimal_places() {
        let (mut store, id) = store_with_job();
        let entry = store.add_entry(id).unwrap();
        store.set_value(id, entry, "1.2345").unwrap();
        store.format_entry(id, entry).unwrap();

        assert_eq!(store.get(id).unwrap().entries[0].value, "1.23");
    }

    #[test]
    fn edits_rearm_errored_job() {
        let (mut store, id) = store_with_job();
        let entry = store.add_entry(id).unwrap();

        let job = store.get_mut(id).unwrap();
        job.status = SubmissionStatus::Error;
        job.status_message = "data submission failed".into();

        store.set_value(id, entry, "2.0").unwrap();
        let job = store.get(id).unwrap();
        assert_eq!(job.status, SubmissionStatus::Idle);
        assert!(job.status_message.is_empty());
    }

    #[test]
    fn duplicate_photos_are_dropped() {
        let (mut store, id) = store_with_job();
        let photo = Photo {
            bytes: vec![1, 2, 3],
            mime: "image/jpeg".into(),
            file_name: "shot.jpg".into(),
        };
        assert!(store.add_photo(id, photo.clone()).unwrap());
        assert!(!store.add_photo(id, photo).unwrap());
        assert_eq!(store.get(id).unwrap().photos.len(), 1);
    }

    #[test]
    fn unknown_job_is_an_error() {
        let store = JobStore::new();
        assert!(matches!(
            store.get(JobId(7)),
            Err(StoreError::UnknownJob(JobId(7)))
        ));
    }
}
