#[derive(Debug, Clone)]
pub enum Progress {
    PhaseStart { name: &'static str },
    PhaseFinish,

    StagesStart { total: u64 },
    StageWritten { ordinal: usize, file_name: String },
    StagesFinish,

    Message(String),
}

pub type ProgressCallback<'a> = Box<dyn Fn(Progress) + Send + Sync + 'a>;

#[derive(Default)]
pub struct ProgressReporter<'a> {
    callback: Option<ProgressCallback<'a>>,
}

impl<'a> ProgressReporter<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_callback(callback: ProgressCallback<'a>) -> Self {
        Self {
            callback: Some(callback),
        }
    }

    #[inline]
    pub fn report(&self, event: Progress) {
        if let Some(cb) = &self.callback {
            cb(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn reporter_without_callback_ignores_events() {
        let reporter = ProgressReporter::new();
        reporter.report(Progress::Message("ignored".to_string()));
    }

    #[test]
    fn reporter_forwards_events_to_callback() {
        let seen = Mutex::new(Vec::new());
        let reporter = ProgressReporter::with_callback(Box::new(|event| {
            if let Progress::StageWritten { ordinal, .. } = event {
                seen.lock().unwrap().push(ordinal);
            }
        }));
        reporter.report(Progress::StagesStart { total: 2 });
        reporter.report(Progress::StageWritten {
            ordinal: 0,
            file_name: "00_minimization.in".to_string(),
        });
        reporter.report(Progress::StageWritten {
            ordinal: 1,
            file_name: "01_minimization.in".to_string(),
        });
        drop(reporter);
        assert_eq!(seen.into_inner().unwrap(), vec![0, 1]);
    }
}
