use crate::models::AdmissionBatch;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::HashSet;
use tracing::info;

const FIRST_NAMES: &[&str] = &[
    "James", "Mary", "Robert", "Patricia", "John", "Jennifer", "Michael", "Linda", "David",
    "Elizabeth", "William", "Barbara", "Richard", "Susan", "Joseph", "Jessica", "Thomas", "Sarah",
    "Christopher", "Karen", "Charles", "Lisa", "Daniel", "Nancy", "Matthew", "Betty", "Anthony",
    "Sandra", "Mark", "Margaret", "Donald", "Ashley", "Steven", "Kimberly", "Andrew", "Emily",
    "Paul", "Donna", "Joshua", "Michelle", "Kenneth", "Carol", "Kevin", "Amanda", "Brian",
    "Melissa", "George", "Deborah", "Timothy", "Stephanie", "Ronald", "Rebecca", "Jason", "Laura",
    "Edward", "Sharon", "Jeffrey", "Cynthia", "Ryan", "Kathleen", "Jacob", "Amy", "Gary", "Angela",
    "Nicholas", "Shirley", "Eric", "Anna", "Jonathan", "Brenda", "Stephen", "Pamela", "Larry",
    "Emma", "Justin", "Nicole", "Scott", "Helen", "Brandon", "Samantha", "Benjamin", "Katherine",
];

const LAST_NAMES: &[&str] = &[
    "Smith", "Johnson", "Williams", "Brown", "Jones", "Garcia", "Miller", "Davis", "Rodriguez",
    "Martinez", "Hernandez", "Lopez", "Gonzalez", "Wilson", "Anderson", "Thomas", "Taylor",
    "Moore", "Jackson", "Martin", "Lee", "Perez", "Thompson", "White", "Harris", "Sanchez",
    "Clark", "Ramirez", "Lewis", "Robinson", "Walker", "Young", "Allen", "King", "Wright", "Scott",
    "Torres", "Nguyen", "Hill", "Flores", "Green", "Adams", "Nelson", "Baker", "Hall", "Rivera",
    "Campbell", "Mitchell", "Carter", "Roberts", "Gomez", "Phillips", "Evans", "Turner", "Diaz",
    "Parker", "Cruz", "Edwards", "Collins", "Reyes", "Stewart", "Morris", "Morales", "Murphy",
    "Cook", "Rogers", "Gutierrez", "Ortiz", "Morgan", "Cooper", "Peterson", "Bailey", "Reed",
];

/// Redraws before falling back to a numeric suffix for a duplicate name
const MAX_REDRAWS: usize = 16;

/// Produces placeholder "First Last" identities.
///
/// Names within one batch are unique, since each one becomes a letter
/// filename. A seeded generator yields the same sequence on every run.
pub struct NameGenerator {
    rng: StdRng,
}

impl NameGenerator {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { rng }
    }

    pub fn next_name(&mut self) -> String {
        // Both lists are non-empty constants
        let first = FIRST_NAMES.choose(&mut self.rng).copied().unwrap_or("Student");
        let last = LAST_NAMES.choose(&mut self.rng).copied().unwrap_or("Applicant");
        format!("{} {}", first, last)
    }

    fn unique_name(&mut self, taken: &HashSet<String>) -> String {
        let mut name = self.next_name();
        for _ in 0..MAX_REDRAWS {
            if !taken.contains(&name) {
                return name;
            }
            name = self.next_name();
        }

        let mut suffix = 2;
        loop {
            let candidate = format!("{} {}", name, suffix);
            if !taken.contains(&candidate) {
                return candidate;
            }
            suffix += 1;
        }
    }

    pub fn anonymize(&mut self, batch: &mut AdmissionBatch) {
        info!(students = batch.len(), "adding synthetic names to preserve student privacy");
        let mut taken = HashSet::with_capacity(batch.len());
        for student in &mut batch.students {
            let name = self.unique_name(&taken);
            taken.insert(name.clone());
            student.name = Some(name);
        }
    }
}
