use std::collections::BTreeSet;

#[derive(Debug, PartialEq, Eq)]
pub struct Domain {
    pub id: &'static str,
    pub label: &'static str,
    pub professional_skills: u32,
    pub community_skills: u32,
}

impl Domain {
    const fn new(
        id: &'static str,
        label: &'static str,
        professional_skills: u32,
        community_skills: u32,
    ) -> Self {
        Self {
            id,
            label,
            professional_skills,
            community_skills,
        }
    }

    /// Source subtrees relative to `templates/skills`.
    pub fn source_groups(&self) -> [String; 2] {
        [
            format!("knowledge/{}", self.id),
            format!("extended/{}", self.id),
        ]
    }
}

// Counts are display-only; the installer reports what it actually finds.
pub static DOMAINS: [Domain; 12] = [
    Domain::new("frontend", "Frontend & UI", 8, 96),
    Domain::new("backend", "Backend & APIs", 9, 88),
    Domain::new("security", "Security", 7, 64),
    Domain::new("devops", "DevOps & Infrastructure", 10, 72),
    Domain::new("cloud", "Cloud Platforms", 8, 41),
    Domain::new("data", "Data & Analytics", 6, 53),
    Domain::new("ai-agents", "AI & Agents", 11, 102),
    Domain::new("testing", "Testing & QA", 5, 47),
    Domain::new("design", "Design & UX", 4, 38),
    Domain::new("architecture", "Architecture", 5, 29),
    Domain::new("mobile", "Mobile", 3, 34),
    Domain::new("productivity", "Productivity & Docs", 4, 58),
];

/// Domains chosen for a custom pack, kept in catalog order without duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomainSelection {
    domains: Vec<&'static Domain>,
}

impl DomainSelection {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn all() -> Self {
        Self {
            domains: DOMAINS.iter().collect(),
        }
    }

    pub fn from_indices(indices: &BTreeSet<usize>) -> Self {
        Self {
            domains: indices
                .iter()
                .filter_map(|index| index.checked_sub(1).and_then(|zero| DOMAINS.get(zero)))
                .collect(),
        }
    }

    pub fn domains(&self) -> &[&'static Domain] {
        &self.domains
    }

    pub fn ids(&self) -> Vec<&'static str> {
        self.domains.iter().map(|domain| domain.id).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }
}

/// Parses `""`, `"all"`, or a comma list of 1-based indices, inclusive
/// `a-b` ranges and domain ids against [`DOMAINS`].
pub fn parse_domain_selection(input: &str) -> DomainSelection {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return DomainSelection::none();
    }
    if trimmed.eq_ignore_ascii_case("all") {
        return DomainSelection::all();
    }

    DomainSelection::from_indices(&parse_selection_indices(trimmed, DOMAINS.len()))
}

pub(crate) fn parse_selection_indices(input: &str, count: usize) -> BTreeSet<usize> {
    let mut indices = BTreeSet::new();
    let in_bounds = |index: usize| (1..=count).contains(&index);

    for token in input.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        if let Ok(index) = token.parse::<usize>() {
            if in_bounds(index) {
                indices.insert(index);
            }
            continue;
        }

        if let Some((start, end)) = token.split_once('-') {
            let bounds = (start.trim().parse::<usize>(), end.trim().parse::<usize>());
            if let (Ok(start), Ok(end)) = bounds {
                let (low, high) = (start.max(1), end.min(count));
                if low <= high {
                    indices.extend(low..=high);
                }
                continue;
            }
        }

        if let Some(position) = DOMAINS
            .iter()
            .take(count)
            .position(|domain| domain.id.eq_ignore_ascii_case(token))
        {
            indices.insert(position + 1);
        }
    }

    indices
}
