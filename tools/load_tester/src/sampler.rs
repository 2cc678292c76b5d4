use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::dataset::ReferenceDataset;

/// One request built from a random dataset row. Never reused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampledRequest {
    /// Feature values of the row, comma separated, no brackets.
    pub data: String,
    /// Model artifact on the multi-model endpoint that should serve the row.
    pub target_model: String,
}

pub fn target_model_for(label: &str) -> String {
    format!("churn-xgb-{label}.tar.gz")
}

/// Per-user view of the shared dataset with its own random source.
pub struct Sampler {
    dataset: Arc<ReferenceDataset>,
    rng: StdRng,
}

impl Sampler {
    pub fn new(dataset: Arc<ReferenceDataset>) -> Self {
        Self {
            dataset,
            rng: StdRng::from_entropy(),
        }
    }

    pub fn with_seed(dataset: Arc<ReferenceDataset>, seed: u64) -> Self {
        Self {
            dataset,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn sample(&mut self) -> SampledRequest {
        self.dataset.sample_with(&mut self.rng)
    }

    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn dataset() -> Arc<ReferenceDataset> {
        let csv = "\
Id,Churn,State,F1,F2,F3
1,0,CA,1,2,3
2,1,NY,4,5,6
3,0,TX,7,8.5,9
4,1,WA,10,11,12
";
        Arc::new(ReferenceDataset::from_reader(csv.as_bytes()).unwrap())
    }

    #[test]
    fn target_model_embeds_label() {
        assert_eq!(target_model_for("CA"), "churn-xgb-CA.tar.gz");
        assert_eq!(target_model_for(""), "churn-xgb-.tar.gz");
    }

    #[test]
    fn every_sample_has_one_value_per_feature() {
        let dataset = dataset();
        let mut sampler = Sampler::new(dataset.clone());

        for _ in 0..200 {
            let request = sampler.sample();
            assert_eq!(
                request.data.matches(',').count(),
                dataset.feature_count() - 1
            );
            assert!(!request.data.contains('['));
            assert!(!request.data.contains(' '));

            let label = request
                .target_model
                .strip_prefix("churn-xgb-")
                .and_then(|rest| rest.strip_suffix(".tar.gz"))
                .expect("target model follows the naming scheme");
            assert!(["CA", "NY", "TX", "WA"].contains(&label));
        }
    }

    #[test]
    fn samples_with_replacement() {
        let dataset = dataset();
        let mut sampler = Sampler::with_seed(dataset.clone(), 7);

        let draws: Vec<_> = (0..dataset.len() * 10).map(|_| sampler.sample()).collect();
        let distinct: HashSet<_> = draws.iter().map(|r| r.data.clone()).collect();

        assert_eq!(draws.len(), 40);
        assert!(distinct.len() < draws.len(), "rows must repeat");
    }

    #[test]
    fn same_seed_same_sequence() {
        let dataset = dataset();
        let mut a = Sampler::with_seed(dataset.clone(), 42);
        let mut b = Sampler::with_seed(dataset, 42);

        for _ in 0..20 {
            assert_eq!(a.sample(), b.sample());
        }
    }
}
