use shelter::AnimalShelter;

/// Print the rec_num the next created document would receive.
pub async fn run(shelter: &AnimalShelter) -> shelter::Result<()> {
    let next = shelter.next_record_number().await?;
    super::write_line(next)
}
