//! Scans skill root directories for `<name>/SKILL.md` files (YAML
//! frontmatter + Markdown body) and caches them by name.

use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::warn;

#[derive(Debug, Clone, Default)]
pub struct Skill {
    pub name: String,
    pub description: String,
    pub instructions: String,
    pub version: Option<String>,
    pub author: Option<String>,
    pub tags: Vec<String>,
    pub triggers: Vec<String>,
    pub prerequisites: Vec<String>,
    pub path: Option<PathBuf>,
}

#[derive(Debug, Default, serde::Deserialize)]
struct Frontmatter {
    name: Option<String>,
    description: Option<String>,
    version: Option<String>,
    author: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    triggers: Vec<String>,
    #[serde(default)]
    prerequisites: Vec<String>,
}

fn frontmatter_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)^---\s*\n(.*?)\n---\s*\n(.*)$").unwrap())
}

/// Splits a `SKILL.md` file into (frontmatter, body). Falls back to an
/// empty frontmatter and the whole file as body if there's no `---` block.
fn parse_skill_md(content: &str) -> (Frontmatter, String) {
    let Some(caps) = frontmatter_re().captures(content) else {
        return (Frontmatter::default(), content.trim().to_string());
    };
    let fm_raw = caps.get(1).unwrap().as_str();
    let body = caps.get(2).unwrap().as_str().trim().to_string();

    let frontmatter = serde_yaml::from_str(fm_raw).unwrap_or_else(|_| parse_frontmatter_fallback(fm_raw));
    (frontmatter, body)
}

/// Minimal `key: value` line parser used if the frontmatter isn't valid YAML,
/// with a `[a, b, c]` bracket form for list-valued keys.
fn parse_frontmatter_fallback(raw: &str) -> Frontmatter {
    let mut map: HashMap<String, serde_yaml::Value> = HashMap::new();
    for line in raw.lines() {
        let Some((k, v)) = line.split_once(':') else {
            continue;
        };
        let (k, v) = (k.trim(), v.trim());
        if k.is_empty() {
            continue;
        }
        if v.starts_with('[') && v.ends_with(']') {
            let items: Vec<serde_yaml::Value> = v[1..v.len() - 1]
                .split(',')
                .map(|s| serde_yaml::Value::String(s.trim().trim_matches(['"', '\'']).to_string()))
                .filter(|v| !matches!(v, serde_yaml::Value::String(s) if s.is_empty()))
                .collect();
            map.insert(k.to_string(), serde_yaml::Value::Sequence(items));
        } else {
            map.insert(k.to_string(), serde_yaml::Value::String(v.to_string()));
        }
    }
    let value = serde_yaml::to_value(map).unwrap_or(serde_yaml::Value::Null);
    serde_yaml::from_value(value).unwrap_or_default()
}

pub struct SkillLoader {
    roots: Vec<PathBuf>,
    by_name: HashMap<String, Skill>,
}

impl SkillLoader {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        let mut loader = Self {
            roots,
            by_name: HashMap::new(),
        };
        loader.load_all();
        loader
    }

    fn load_all(&mut self) {
        let roots = self.roots.clone();
        for root in &roots {
            let Ok(entries) = std::fs::read_dir(root) else {
                continue;
            };
            for entry in entries.flatten() {
                let sub = entry.path();
                if !sub.is_dir() {
                    continue;
                }
                let skill_file = sub.join("SKILL.md");
                if !skill_file.exists() {
                    continue;
                }
                match std::fs::read_to_string(&skill_file) {
                    Ok(content) => self.load_one(&sub, &content),
                    Err(e) => warn!(path = %skill_file.display(), error = %e, "failed to read SKILL.md"),
                }
            }
        }
    }

    fn load_one(&mut self, dir: &Path, content: &str) {
        let (fm, body) = parse_skill_md(content);
        let name = fm
            .name
            .unwrap_or_else(|| dir.file_name().unwrap_or_default().to_string_lossy().into_owned());
        let skill = Skill {
            name: name.clone(),
            description: fm.description.unwrap_or_default(),
            instructions: body,
            version: fm.version,
            author: fm.author,
            tags: fm.tags,
            triggers: fm.triggers,
            prerequisites: fm.prerequisites,
            path: Some(dir.to_path_buf()),
        };
        self.by_name.insert(name, skill);
    }

    pub fn get_skill(&self, name: &str) -> Option<&Skill> {
        self.by_name.get(name)
    }

    pub fn get_skills_by_tag(&self, tag: &str) -> Vec<&Skill> {
        self.by_name.values().filter(|s| s.tags.iter().any(|t| t == tag)).collect()
    }

    /// Skills whose `triggers` appear as a substring of `query` first,
    /// followed by (non-overlapping) skills matched by `tags`.
    pub fn get_skills_by_triggers(&self, query: &str) -> Vec<&Skill> {
        let q = query.to_lowercase();
        let mut by_trigger = Vec::new();
        let mut by_tag = Vec::new();

        for skill in self.by_name.values() {
            if skill.triggers.iter().any(|t| q.contains(&t.to_lowercase())) {
                by_trigger.push(skill);
            } else if skill.tags.iter().any(|t| q.contains(&t.to_lowercase())) {
                by_tag.push(skill);
            }
        }

        by_trigger.extend(by_tag);
        by_trigger
    }

    pub fn list_skills(&self) -> Vec<&Skill> {
        self.by_name.values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_skill(dir: &Path, name: &str, content: &str) {
        let sub = dir.join(name);
        fs::create_dir_all(&sub).unwrap();
        fs::write(sub.join("SKILL.md"), content).unwrap();
    }

    #[test]
    fn parses_frontmatter_and_body() {
        let tmp = tempfile::tempdir().unwrap();
        write_skill(
            tmp.path(),
            "meshing-basics",
            "---\nname: meshing-basics\ndescription: how to mesh\ntags: [mesh, geometry]\ntriggers: [\"mesh\", \"细化\"]\n---\nUse finer mesh near sharp corners.\n",
        );

        let loader = SkillLoader::new(vec![tmp.path().to_path_buf()]);
        let skill = loader.get_skill("meshing-basics").unwrap();
        assert_eq!(skill.description, "how to mesh");
        assert_eq!(skill.tags, vec!["mesh", "geometry"]);
        assert!(skill.instructions.contains("finer mesh"));
    }

    #[test]
    fn triggers_match_before_tags() {
        let tmp = tempfile::tempdir().unwrap();
        write_skill(
            tmp.path(),
            "a",
            "---\nname: a\ntags: [steel]\n---\nA body.\n",
        );
        write_skill(
            tmp.path(),
            "b",
            "---\nname: b\ntriggers: [steel]\n---\nB body.\n",
        );

        let loader = SkillLoader::new(vec![tmp.path().to_path_buf()]);
        let hits = loader.get_skills_by_triggers("pick a steel material");
        assert_eq!(hits[0].name, "b");
        assert_eq!(hits[1].name, "a");
    }

    #[test]
    fn missing_root_is_silently_skipped() {
        let loader = SkillLoader::new(vec![PathBuf::from("/nonexistent/root/path")]);
        assert!(loader.list_skills().is_empty());
    }
}
