//! Sentence/word tokenization of a file body (spec §3, §4.3).
//!
//! A body is stored both as the tokenized structure (for word-level
//! mutation) and regenerated to a flat byte image on every mutation, since
//! `READ`/`STREAM`/checkpoints all want the byte-exact text.

/// One sentence: its words plus the terminator that ended it (`.`, `!`, or
/// `?`), or `None` if it's the trailing, unterminated remainder of the
/// file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Sentence {
    pub words: Vec<String>,
    pub terminator: Option<char>,
}

impl Sentence {
    /// Renders this sentence back to text: words joined by single spaces,
    /// followed by the terminator if one was recorded.
    pub fn render(&self) -> String {
        let mut s = self.words.join(" ");
        if let Some(t) = self.terminator {
            s.push(t);
        }
        s
    }
}

/// The tokenized body of a file: an ordered sequence of sentences.
#[derive(Debug, Clone, Default)]
pub struct Body {
    pub sentences: Vec<Sentence>,
}

const TERMINATORS: [char; 3] = ['.', '!', '?'];

impl Body {
    /// Tokenizes raw text into sentences and words. A sentence ends at `.`,
    /// `!`, or `?`; words are whitespace-separated tokens within a
    /// sentence. Runs of whitespace between sentences are not preserved —
    /// `render()` reconstitutes a canonical single-space rendering, which is
    /// what every round-trip law in spec §8 is checked against.
    pub fn parse(text: &str) -> Self {
        let mut sentences = Vec::new();
        let mut words = Vec::new();
        let mut word = String::new();

        let flush_word = |word: &mut String, words: &mut Vec<String>| {
            if !word.is_empty() {
                words.push(std::mem::take(word));
            }
        };

        for ch in text.chars() {
            if TERMINATORS.contains(&ch) {
                flush_word(&mut word, &mut words);
                sentences.push(Sentence {
                    words: std::mem::take(&mut words),
                    terminator: Some(ch),
                });
            } else if ch.is_whitespace() {
                flush_word(&mut word, &mut words);
            } else {
                word.push(ch);
            }
        }
        flush_word(&mut word, &mut words);
        if !words.is_empty() {
            sentences.push(Sentence {
                words,
                terminator: None,
            });
        }

        Body { sentences }
    }

    /// Renders the tokenized body back to a single text image, one space
    /// between sentences.
    pub fn render(&self) -> String {
        self.sentences
            .iter()
            .map(Sentence::render)
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn word_count(&self) -> usize {
        self.sentences.iter().map(|s| s.words.len()).sum()
    }

    pub fn char_count(&self) -> usize {
        self.render().chars().count()
    }

    pub fn sentence(&self, index: i32) -> Option<&Sentence> {
        if index < 0 {
            return None;
        }
        self.sentences.get(index as usize)
    }

    pub fn sentence_mut(&mut self, index: i32) -> Option<&mut Sentence> {
        if index < 0 {
            return None;
        }
        self.sentences.get_mut(index as usize)
    }

    /// All words in document order, flattened across sentences, for
    /// `STREAM` (spec §4.3). Each sentence's terminator is reattached to its
    /// last word, since `STREAM` delivers document text, not bare tokens —
    /// scenario 6 expects `"world."`/`"Bye."`, not `"world"`/`"Bye"`.
    pub fn stream_words(&self) -> Vec<String> {
        let mut out = Vec::new();
        for s in &self.sentences {
            let last = s.words.len().saturating_sub(1);
            for (i, w) in s.words.iter().enumerate() {
                if i == last {
                    let mut word = w.clone();
                    if let Some(t) = s.terminator {
                        word.push(t);
                    }
                    out.push(word);
                } else {
                    out.push(w.clone());
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_scenario_2_from_spec() {
        let body = Body::parse("Hello world. Bye.");
        assert_eq!(body.word_count(), 3);
        assert_eq!(body.char_count(), "Hello world. Bye.".chars().count());
        assert_eq!(body.render(), "Hello world. Bye.");
        assert_eq!(body.sentences.len(), 2);
        assert_eq!(body.sentences[0].words, vec!["Hello", "world"]);
        assert_eq!(body.sentences[0].terminator, Some('.'));
        assert_eq!(body.sentences[1].words, vec!["Bye"]);
    }

    #[test]
    fn empty_file_has_zero_counts() {
        let body = Body::parse("");
        assert_eq!(body.word_count(), 0);
        assert_eq!(body.char_count(), 0);
        assert!(body.sentences.is_empty());
    }

    #[test]
    fn trailing_unterminated_text_is_its_own_sentence() {
        let body = Body::parse("One sentence. trailing words");
        assert_eq!(body.sentences.len(), 2);
        assert_eq!(body.sentences[1].terminator, None);
        assert_eq!(body.sentences[1].words, vec!["trailing", "words"]);
    }

    #[test]
    fn stream_words_reattaches_terminators() {
        let body = Body::parse("Hello world. Bye.");
        assert_eq!(body.stream_words(), vec!["Hello", "world.", "Bye."]);
    }
}
