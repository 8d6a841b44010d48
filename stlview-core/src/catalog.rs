/// Showcased projects and the STL each one displays
use crate::viewer::MeshSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Project {
    pub title: &'static str,
    pub description: &'static str,
    pub image_url: &'static str,
    pub stl_url: &'static str,
    pub tags: &'static [&'static str],
}

impl Project {
    pub fn mesh_source(&self) -> MeshSource {
        MeshSource::new(self.stl_url)
    }

    /// Locator relative to an asset root (leading `/` stripped)
    pub fn relative_path(&self) -> &'static str {
        self.stl_url.trim_start_matches('/')
    }
}

pub const PROJECTS: &[Project] = &[
    Project {
        title: "Industrial Fan Assembly",
        description: "A complete 3D model of a heavy-duty industrial fan, designed for optimal airflow and durability.",
        image_url: "https://placehold.co/600x400/e2e8f0/334155?text=image_965102.png",
        stl_url: "/Jug.STL",
        tags: &["3D Modeling", "Assembly"],
    },
    Project {
        title: "Mould Base Exploded View",
        description: "An exploded-view rendering of a complex injection mould base, detailing every component.",
        image_url: "https://placehold.co/600x400/f0e2e8/443355?text=image_965120.png",
        stl_url: "/Punch E11.STL",
        tags: &["Rendering", "Dies & Moulds"],
    },
    Project {
        title: "Cylindrical Grinding Jig",
        description: "A custom-designed jig for holding cylindrical parts securely during precision grinding operations.",
        image_url: "https://placehold.co/600x400/e8f0e2/554433?text=image_965128.png",
        stl_url: "/Four way connector.STL",
        tags: &["Jigs & Fixtures", "Manufacturing"],
    },
];

pub fn find(title: &str) -> Option<&'static Project> {
    PROJECTS.iter().find(|p| p.title.eq_ignore_ascii_case(title))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_project_has_a_mesh() {
        for project in PROJECTS {
            assert!(project.stl_url.to_ascii_lowercase().ends_with(".stl"));
            assert!(!project.relative_path().starts_with('/'));
        }
    }

    #[test]
    fn test_find_by_title() {
        let project = find("cylindrical grinding jig").unwrap();
        assert_eq!(project.mesh_source().as_str(), "/Four way connector.STL");
        assert!(find("missing").is_none());
    }
}
