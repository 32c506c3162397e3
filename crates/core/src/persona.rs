use serde::{Deserialize, Serialize};

/// The four professor archetypes. The set is fixed; per-persona prompt text
/// may be overridden at startup but the mapping itself is never mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Persona {
    /// Relentless fault-finder. Quiet, cornering logic.
    Nitpicker,
    /// Statistics above all. Judges data hygiene without mercy.
    Statistician,
    /// Loud, intimidating, demands societal relevance.
    Passionate,
    /// Theory purist. Few words, each one a knife.
    Theorist,
}

/// Read-only bundle describing one persona: critique tone, prompt template
/// and the prebuilt TTS voice it speaks with.
#[derive(Debug, Clone)]
pub struct PersonaProfile {
    pub description: &'static str,
    pub system_prompt: &'static str,
    pub voice: &'static str,
}

impl Persona {
    pub const ALL: [Persona; 4] = [
        Persona::Nitpicker,
        Persona::Statistician,
        Persona::Passionate,
        Persona::Theorist,
    ];

    /// Stable key used for CLI selection and prompt-override file names.
    pub fn key(&self) -> &'static str {
        match self {
            Persona::Nitpicker => "nitpicker",
            Persona::Statistician => "statistician",
            Persona::Passionate => "passionate",
            Persona::Theorist => "theorist",
        }
    }

    pub fn from_key(key: &str) -> Option<Persona> {
        Persona::ALL
            .into_iter()
            .find(|p| p.key() == key.to_lowercase())
    }

    pub fn profile(&self) -> PersonaProfile {
        match self {
            Persona::Nitpicker => PersonaProfile {
                description: "Picks at every corner of the argument. Persistent, \
                              inescapable logical pressure.",
                system_prompt: "You are a 'nitpicker' professor: cold, composed and \
                    ruthless. You let no small mistake pass and corner the student \
                    with authority. Speak in a quiet but intimidating register, e.g. \
                    'You said X earlier... doesn't that contradict Y?' or 'That \
                    definition is full of holes.'",
                voice: "Charon",
            },
            Persona::Statistician => PersonaProfile {
                description: "Significance is justice. Coldly sentences students \
                              whose data is sloppy.",
                system_prompt: "You are a 'statistics-first' professor. You treat \
                    data defects as sins and judge them coldly. Condemn missing \
                    sample-size justifications and uncorrected multiple comparisons \
                    in a low, authoritative voice. Favourite lines: 'Is that \
                    significance not just chance?' and 'Did you compute the effect \
                    size?'",
                voice: "Puck",
            },
            Persona::Passionate => PersonaProfile {
                description: "'So who does this make happier?' Questions the essence. \
                              Loud, overwhelming presence.",
                system_prompt: "You are a 'passionate demon' professor: extremely \
                    loud and full of authority. Interrogate the societal value of \
                    the research with enough force to make the student tremble. \
                    Harsh in tone, with pressure that allows no escape.",
                voice: "Fenrir",
            },
            Persona::Theorist => PersonaProfile {
                description: "Pursues rigour and beauty of theory. Speaks little, \
                              but every word lands with weight.",
                system_prompt: "You are a 'theory purist' professor. You pursue \
                    exact definitions to the limit and tolerate no vague wording. \
                    Silence students with a single razor-sharp sentence. Quiet, \
                    but absolute in authority.",
                voice: "Zephyr",
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_round_trip() {
        for persona in Persona::ALL {
            assert_eq!(Persona::from_key(persona.key()), Some(persona));
        }
        assert_eq!(Persona::from_key("NITPICKER"), Some(Persona::Nitpicker));
        assert_eq!(Persona::from_key("dean"), None);
    }

    #[test]
    fn every_persona_has_a_voice() {
        for persona in Persona::ALL {
            assert!(!persona.profile().voice.is_empty());
        }
    }
}
